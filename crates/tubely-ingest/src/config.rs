//! Upload pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use tubely_storage::PublicUrlBuilder;

use crate::error::{IngestError, IngestResult};
use crate::retry::RetryConfig;

/// Default upload cap: 1 GiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1 << 30;

/// Upload pipeline configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Bucket receiving processed videos
    pub bucket: String,
    /// Builds the public URL stored on the record
    pub public_urls: PublicUrlBuilder,
    /// Largest accepted upload body
    pub max_upload_bytes: u64,
    /// Parent directory for per-upload temp directories
    pub work_dir: PathBuf,
    /// Deadline for the metadata probe
    pub probe_timeout: Duration,
    /// Deadline for the fast-start remux
    pub remux_timeout: Duration,
    /// Retry policy for the object-store write
    pub store_retry: RetryConfig,
    /// Retry policy for the final record update
    pub record_retry: RetryConfig,
    /// Re-check ownership when the record is re-read for the final update
    pub recheck_owner_before_update: bool,
}

impl IngestConfig {
    pub fn new(bucket: impl Into<String>, public_urls: PublicUrlBuilder) -> Self {
        Self {
            bucket: bucket.into(),
            public_urls,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            work_dir: std::env::temp_dir(),
            probe_timeout: Duration::from_secs(60),
            remux_timeout: Duration::from_secs(600),
            store_retry: RetryConfig::default(),
            record_retry: RetryConfig::default(),
            recheck_owner_before_update: true,
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn with_owner_recheck(mut self, enabled: bool) -> Self {
        self.recheck_owner_before_update = enabled;
        self
    }

    pub fn with_retries(mut self, store_retry: RetryConfig, record_retry: RetryConfig) -> Self {
        self.store_retry = store_retry;
        self.record_retry = record_retry;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `S3_BUCKET` is required. The public base URL defaults to the bucket's
    /// virtual-hosted S3 endpoint when `PUBLIC_BASE_URL` is unset.
    pub fn from_env() -> IngestResult<Self> {
        let bucket = std::env::var("S3_BUCKET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| IngestError::config_error("S3_BUCKET is required"))?;

        let public_urls = match std::env::var("PUBLIC_BASE_URL").ok().filter(|s| !s.is_empty()) {
            Some(base) => PublicUrlBuilder::new(&base),
            None => {
                let region =
                    std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
                PublicUrlBuilder::for_bucket(&bucket, &region)
            }
        }
        .map_err(|e| IngestError::config_error(e.to_string()))?;

        let max_upload_bytes = env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(IngestError::config_error("MAX_UPLOAD_BYTES must be positive"));
        }

        let base_delay = Duration::from_millis(env_parse("UPLOAD_RETRY_BASE_MS", 200));

        Ok(Self {
            bucket,
            public_urls,
            max_upload_bytes,
            work_dir: std::env::var("UPLOAD_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            probe_timeout: Duration::from_secs(env_parse("PROBE_TIMEOUT_SECS", 60)),
            remux_timeout: Duration::from_secs(env_parse("REMUX_TIMEOUT_SECS", 600)),
            store_retry: RetryConfig::default()
                .with_max_retries(env_parse("UPLOAD_STORE_MAX_RETRIES", 2))
                .with_base_delay(base_delay),
            record_retry: RetryConfig::default()
                .with_max_retries(env_parse("UPLOAD_RECORD_MAX_RETRIES", 2))
                .with_base_delay(base_delay),
            recheck_owner_before_update: std::env::var("UPLOAD_RECHECK_OWNER")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
