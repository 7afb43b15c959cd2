//! Per-key JWKS cache abstraction.
//!
//! The cache maps a `kid` to the published [`Jwk`] with a fixed TTL. Two
//! backends implement [`JwksKeyCache`]:
//!
//! - [`InMemoryJwksKeyCache`] - process-local map
//! - [`RedisJwksKeyCache`] - shared across replicas
//!
//! Every read reconstructs the decoding key from `n`/`e`, so a corrupt entry
//! is found at read time, evicted, and reported as a miss. Not-found and
//! expired both read as `None`.

use crate::auth::memory_cache::InMemoryJwksKeyCache;
use crate::auth::redis_cache::{RedisJwksKeyCache, REDIS_CONNECT_TIMEOUT};
use crate::config::{CacheBackend, Config};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::jwks::Jwk;
use jsonwebtoken::DecodingKey;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A cached signing key ready for verification.
#[derive(Clone)]
pub struct CachedKeyEntry {
    pub jwk: Jwk,

    /// Rebuilt from `jwk` on the read that produced this entry.
    pub decoding_key: DecodingKey,

    pub cached_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for CachedKeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedKeyEntry")
            .field("kid", &self.jwk.kid)
            .field("cached_at", &self.cached_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyCacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Key-value store of signing keys by `kid`.
///
/// Implementations are shared by every request task and the background
/// refresher; only the refresh coordinator writes.
#[async_trait]
pub trait JwksKeyCache: Send + Sync {
    /// Returns the entry for `kid` if present, unexpired and usable.
    async fn try_get(&self, kid: &str) -> Option<CachedKeyEntry>;

    /// Stores `jwk` under `kid` for `ttl`. A zero `ttl` removes the entry.
    async fn set(&self, kid: &str, jwk: &Jwk, ttl: Duration) -> Result<(), KeyCacheError>;

    async fn remove(&self, kid: &str) -> Result<(), KeyCacheError>;

    /// Backend name for logs and metrics labels.
    fn backend(&self) -> &'static str;
}

/// Wall-clock expiry for an entry stored at `cached_at`.
pub(crate) fn wall_clock_expiry(cached_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| cached_at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Build the configured cache backend.
///
/// The choice is made once. When the distributed backend cannot be reached
/// within [`REDIS_CONNECT_TIMEOUT`] a warning is logged and the in-memory
/// backend is used for the life of the process.
pub async fn build_key_cache(config: &Config) -> Arc<dyn JwksKeyCache> {
    match config.cache_backend {
        CacheBackend::InMemory => {
            tracing::info!(target: "os.auth.cache", backend = "in_memory", "Using in-memory JWKS key cache");
            Arc::new(InMemoryJwksKeyCache::new())
        }
        CacheBackend::Distributed => {
            match RedisJwksKeyCache::connect(&config.redis_url, REDIS_CONNECT_TIMEOUT).await {
                Ok(cache) => {
                    tracing::info!(target: "os.auth.cache", backend = "distributed", "Using Redis JWKS key cache");
                    Arc::new(cache)
                }
                Err(e) => {
                    tracing::warn!(
                        target: "os.auth.cache",
                        error = %e,
                        "Distributed JWKS key cache unavailable, falling back to in-memory cache"
                    );
                    Arc::new(InMemoryJwksKeyCache::new())
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::testing::{test_jwk, TEST_KEY_ID};
    use secrecy::SecretString;
    use std::collections::HashMap;

    #[test]
    fn test_wall_clock_expiry() {
        let now = Utc::now();
        assert_eq!(
            wall_clock_expiry(now, Duration::from_secs(600)),
            now + chrono::Duration::seconds(600)
        );
        assert_eq!(
            wall_clock_expiry(now, Duration::from_secs(u64::MAX)),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[tokio::test]
    async fn test_build_in_memory_cache() {
        let config = Config::from_vars(&HashMap::new()).unwrap();

        let cache = build_key_cache(&config).await;

        assert_eq!(cache.backend(), "in_memory");
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back_to_memory() {
        let mut config = Config::from_vars(&HashMap::from([(
            "JWKS_CACHE_TYPE".to_string(),
            "distributed".to_string(),
        )]))
        .unwrap();
        // Port 1 is reserved and refuses connections
        config.redis_url = SecretString::from("redis://127.0.0.1:1".to_string());

        let cache = build_key_cache(&config).await;

        assert_eq!(cache.backend(), "in_memory");
        cache
            .set(TEST_KEY_ID, &test_jwk(TEST_KEY_ID), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.try_get(TEST_KEY_ID).await.is_some());
    }

    #[test]
    fn test_entry_debug_omits_key_material() {
        let jwk = test_jwk(TEST_KEY_ID);
        let entry = CachedKeyEntry {
            decoding_key: jwk.to_decoding_key().unwrap(),
            jwk: jwk.clone(),
            cached_at: Utc::now(),
            expires_at: Utc::now(),
        };

        let debug = format!("{:?}", entry);
        assert!(debug.contains(TEST_KEY_ID));
        assert!(!debug.contains(&jwk.n));
    }
}
