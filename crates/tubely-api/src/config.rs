//! API configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Default thumbnail cap: 10 MiB.
pub const DEFAULT_MAX_THUMBNAIL_BYTES: usize = 10 << 20;

#[derive(Debug, Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: String,
    /// HS256 secret for access tokens
    pub jwt_secret: String,
    /// Directory thumbnails are written to and served from
    pub assets_root: PathBuf,
    /// Public address of `assets_root`
    pub assets_base_url: String,
    /// Largest accepted thumbnail
    pub max_thumbnail_bytes: usize,
}

impl ApiConfig {
    /// Config with local defaults, for tests and tooling.
    pub fn new(jwt_secret: impl Into<String>, assets_root: impl Into<PathBuf>) -> Self {
        let port = 8091;
        Self {
            host: "0.0.0.0".to_string(),
            port,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
            jwt_secret: jwt_secret.into(),
            assets_root: assets_root.into(),
            assets_base_url: format!("http://localhost:{}/assets", port),
            max_thumbnail_bytes: DEFAULT_MAX_THUMBNAIL_BYTES,
        }
    }

    /// Create config from environment variables. `JWT_SECRET` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError("JWT_SECRET is required".to_string()))?;

        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8091);

        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            jwt_secret,
            assets_root: std::env::var("ASSETS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./assets")),
            assets_base_url: std::env::var("ASSETS_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{}/assets", port)),
            max_thumbnail_bytes: std::env::var("MAX_THUMBNAIL_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_THUMBNAIL_BYTES),
        })
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_requires_secret() {
        std::env::remove_var("JWT_SECRET");
        assert!(ApiConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        std::env::set_var("JWT_SECRET", "secret");
        std::env::remove_var("API_PORT");
        std::env::remove_var("ASSETS_BASE_URL");

        let config = ApiConfig::from_env().unwrap();
        assert_eq!(config.port, 8091);
        assert_eq!(config.assets_base_url, "http://localhost:8091/assets");
        assert_eq!(config.max_thumbnail_bytes, DEFAULT_MAX_THUMBNAIL_BYTES);
        assert!(!config.is_production());

        std::env::remove_var("JWT_SECRET");
    }
}
