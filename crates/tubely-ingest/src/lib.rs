//! Video upload pipeline.
//!
//! This crate provides:
//! - The staged upload pipeline (validate, buffer, probe, remux, store, record)
//! - Per-upload temp directory ownership and cleanup
//! - Bounded retries for the remote steps
//! - Upload metrics and structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use logging::UploadLogger;
pub use pipeline::UploadPipeline;
pub use retry::RetryConfig;
pub use session::{UploadRequest, UploadSession, UploadStage};
