//! Shared data models for the Tubely backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video records and their identifiers
//! - Orientation classification of uploaded video
//! - Accepted upload content types

pub mod media_type;
pub mod orientation;
pub mod video;

// Re-export common types
pub use orientation::OrientationClass;
pub use video::{InvalidVideoId, UserId, VideoId, VideoRecord};
