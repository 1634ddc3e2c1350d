//! Firestore REST API client.
//!
//! This crate provides:
//! - The `VideoRecordStore` seam and its Firestore repository
//! - Service account authentication via gcp_auth, or the local emulator
//! - Conditional (revision-checked) updates and retry logic

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod videos;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use videos::{VideoRecordStore, VideoRepository};
