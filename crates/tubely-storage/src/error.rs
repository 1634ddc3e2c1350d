//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Upload failed: {message}")]
    UploadFailed { message: String, retryable: bool },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AWS SDK error: {0}")]
    AwsSdk(String),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Upload failure that will not succeed on retry (rejected request, bad credentials).
    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed {
            message: msg.into(),
            retryable: false,
        }
    }

    /// Upload failure caused by the network or a 5xx from the store.
    pub fn upload_transient(msg: impl Into<String>) -> Self {
        Self::UploadFailed {
            message: msg.into(),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UploadFailed { retryable: true, .. })
    }
}
