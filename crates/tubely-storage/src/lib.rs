//! S3 object storage for processed uploads.
//!
//! This crate provides:
//! - The `ObjectStore` seam and its S3 implementation
//! - Collision-resistant, orientation-namespaced object keys
//! - Public delivery URL construction

pub mod client;
pub mod delivery;
pub mod error;
pub mod keys;

pub use client::{ObjectStore, S3Client, S3Config};
pub use delivery::PublicUrlBuilder;
pub use error::{StorageError, StorageResult};
pub use keys::ObjectKey;
