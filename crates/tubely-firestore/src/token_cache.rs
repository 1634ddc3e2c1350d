//! Access tokens for the Firestore REST API.
//!
//! Service-account tokens are cached until shortly before expiry and
//! refreshed by a single task at a time. Against the emulator no real
//! credentials exist and a fixed `owner` token is sent instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the provider-reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the provider's expiry cannot be converted.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore/Datastore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Token accepted by the Firestore emulator with full privileges.
pub const EMULATOR_TOKEN: &str = "owner";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Source of bearer tokens for outgoing requests.
pub enum AccessTokens {
    /// Real credentials with a shared cache.
    ServiceAccount(TokenCache),
    /// Local emulator.
    Emulator,
}

impl AccessTokens {
    pub async fn get(&self) -> FirestoreResult<String> {
        match self {
            Self::ServiceAccount(cache) => cache.get_token().await,
            Self::Emulator => Ok(EMULATOR_TOKEN.to_string()),
        }
    }

    /// Drop any cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        if let Self::ServiceAccount(cache) = self {
            cache.invalidate().await;
        }
    }
}

/// Thread-safe token cache with single-flight refresh.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(None),
        }
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Return a fresh token, refreshing under the write lock when needed.
    ///
    /// If the refresh fails while the old token has not yet expired, the old
    /// token is returned.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        match self.provider.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let now = Utc::now();
                let expires = token.expires_at();
                let expires_at = if expires > now {
                    Instant::now() + (expires - now).to_std().unwrap_or(TOKEN_DEFAULT_TTL)
                } else {
                    Instant::now()
                };

                let access_token = token.as_str().to_string();
                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });

                debug!("Refreshed Firestore access token");
                Ok(access_token)
            }
            Err(e) => match cache.as_ref() {
                Some(cached) if cached.is_usable() => {
                    warn!("Token refresh failed, using existing token: {}", e);
                    Ok(cached.access_token.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emulator_token() {
        let tokens = AccessTokens::Emulator;
        assert_eq!(tokens.get().await.unwrap(), EMULATOR_TOKEN);
        tokens.invalidate().await;
        assert_eq!(tokens.get().await.unwrap(), EMULATOR_TOKEN);
    }

    #[test]
    fn test_cached_token_margin() {
        let soon = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!soon.is_fresh());
        assert!(soon.is_usable());

        let later = CachedToken {
            access_token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(later.is_fresh());
    }
}
