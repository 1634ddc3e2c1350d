//! Public delivery URLs for stored objects.
//!
//! URLs are computed from configuration alone, so any caller holding a key
//! can rebuild the same URL without talking to the store.

use url::Url;

use crate::error::{StorageError, StorageResult};
use crate::keys::ObjectKey;

/// Builds `<base>/<key>` URLs for objects in one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrlBuilder {
    base_url: String,
}

impl PublicUrlBuilder {
    /// Use an explicit base address such as a CDN distribution.
    pub fn new(base_url: &str) -> StorageResult<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| StorageError::config_error(format!("invalid public base URL {base_url}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StorageError::config_error(format!(
                "public base URL must be http(s): {base_url}"
            )));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(StorageError::config_error(format!(
                "public base URL must not carry a query or fragment: {base_url}"
            )));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Virtual-hosted S3 address of `bucket` in `region`.
    pub fn for_bucket(bucket: &str, region: &str) -> StorageResult<Self> {
        Self::new(&format!("https://{bucket}.s3.{region}.amazonaws.com"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn object_url(&self, key: &ObjectKey) -> String {
        format!("{}/{}", self.base_url, key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubely_models::OrientationClass;

    #[test]
    fn test_object_url_joins_base_and_key() {
        let urls = PublicUrlBuilder::new("https://d111111abcdef8.cloudfront.net/").unwrap();
        let key = ObjectKey::generate(OrientationClass::Landscape);
        assert_eq!(
            urls.object_url(&key),
            format!("https://d111111abcdef8.cloudfront.net/{}", key.as_str())
        );
    }

    #[test]
    fn test_object_url_is_deterministic() {
        let urls = PublicUrlBuilder::new("https://cdn.example.com/videos").unwrap();
        let key = ObjectKey::generate(OrientationClass::Other);
        assert_eq!(urls.object_url(&key), urls.object_url(&key));
        assert!(urls.object_url(&key).starts_with("https://cdn.example.com/videos/other/"));
    }

    #[test]
    fn test_for_bucket() {
        let urls = PublicUrlBuilder::for_bucket("tubely-media", "us-east-2").unwrap();
        assert_eq!(urls.base_url(), "https://tubely-media.s3.us-east-2.amazonaws.com");
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(PublicUrlBuilder::new("not a url").is_err());
        assert!(PublicUrlBuilder::new("ftp://files.example.com").is_err());
        assert!(PublicUrlBuilder::new("https://cdn.example.com/?sig=1").is_err());
    }
}
