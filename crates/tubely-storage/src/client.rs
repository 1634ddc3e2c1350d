//! S3 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::keys::ObjectKey;

/// Durable blob storage addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write the file at `path` to `bucket/key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Verify the bucket is reachable. Used by readiness checks.
    async fn check_bucket(&self, _bucket: &str) -> StorageResult<()> {
        Ok(())
    }
}

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Region of the bucket
    pub region: String,
    /// Endpoint override for S3-compatible stores
    pub endpoint_url: Option<String>,
    /// Static access key ID; the default provider chain is used when absent
    pub access_key_id: Option<String>,
    /// Static secret access key
    pub secret_access_key: Option<String>,
    /// Path-style addressing, required by most S3-compatible stores
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let access_key_id = std::env::var("S3_ACCESS_KEY_ID").ok();
        let secret_access_key = std::env::var("S3_SECRET_ACCESS_KEY").ok();
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together",
            ));
        }

        let endpoint_url = std::env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.is_empty());
        let force_path_style = std::env::var("S3_FORCE_PATH_STYLE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(endpoint_url.is_some());

        Ok(Self {
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint_url,
            access_key_id,
            secret_access_key,
            force_path_style,
        })
    }
}

/// S3 storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create a new S3 client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key_id), Some(secret)) => Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(key_id, secret, None, None, "tubely")),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.force_path_style(config.force_path_style).build());
        Ok(Self { client })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    /// Upload a file.
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} to s3://{}/{}", path.display(), bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                if is_transient(&e) {
                    StorageError::upload_transient(message)
                } else {
                    StorageError::upload_failed(message)
                }
            })?;

        info!("Uploaded {} to s3://{}/{}", path.display(), bucket, key);
        Ok(())
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::AwsSdk(format!(
                    "S3 connectivity check failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        self.upload_file(bucket, key.as_str(), path, content_type).await
    }

    async fn check_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.check_connectivity(bucket).await
    }
}

/// Network failures, timeouts, throttling and 5xx responses are worth retrying.
fn is_transient<E>(err: &SdkError<E, HttpResponse>) -> bool {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            status == 429 || status >= 500
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "S3_REGION",
            "S3_ENDPOINT_URL",
            "S3_ACCESS_KEY_ID",
            "S3_SECRET_ACCESS_KEY",
            "S3_FORCE_PATH_STYLE",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        let config = S3Config::from_env().unwrap();
        assert_eq!(config.region, "us-east-1");
        assert!(config.endpoint_url.is_none());
        assert!(!config.force_path_style);
    }

    #[test]
    #[serial]
    fn test_endpoint_implies_path_style() {
        clear_env();
        std::env::set_var("S3_ENDPOINT_URL", "http://localhost:9000");
        let config = S3Config::from_env().unwrap();
        assert!(config.force_path_style);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_partial_credentials_rejected() {
        clear_env();
        std::env::set_var("S3_ACCESS_KEY_ID", "AKIA");
        assert!(matches!(
            S3Config::from_env(),
            Err(StorageError::ConfigError(_))
        ));
        clear_env();
    }
}
