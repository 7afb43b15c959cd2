//! Redis-backed JWKS key cache, shared across service replicas.
//!
//! # Key Patterns
//!
//! - `jwks:kid:{kid}` - JSON [`StoredKeyRecord`], expired by Redis via `PX`
//!
//! The `MultiplexedConnection` is cheap to clone and safe for concurrent
//! use; each operation clones it rather than locking. Every command is
//! bounded by [`REDIS_OPERATION_TIMEOUT`] so a stalled server cannot hold up
//! token verification.

use crate::auth::key_cache::{wall_clock_expiry, CachedKeyEntry, JwksKeyCache, KeyCacheError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::jwks::{decoding_key_from_jwk, Jwk};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

/// Prefix for every cache key.
pub const KEY_PREFIX: &str = "jwks:kid:";

/// Bound on the initial connection attempt.
pub const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on each GET/SET/DEL.
pub const REDIS_OPERATION_TIMEOUT: Duration = Duration::from_millis(500);

/// Value stored under each key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKeyRecord {
    pub jwk: Jwk,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub fn cache_key(kid: &str) -> String {
    format!("{KEY_PREFIX}{kid}")
}

/// Millisecond TTL for `PX`, never below 1.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Run a Redis command, mapping both command errors and timeouts to
/// `KeyCacheError::Backend`.
async fn with_operation_timeout<T, F>(
    timeout: Duration,
    operation: &'static str,
    command: F,
) -> Result<T, KeyCacheError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(timeout, command).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(KeyCacheError::Backend(format!("Redis {operation} failed: {e}"))),
        Err(_) => Err(KeyCacheError::Backend(format!(
            "Redis {operation} timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

#[derive(Clone)]
pub struct RedisJwksKeyCache {
    connection: MultiplexedConnection,
}

impl RedisJwksKeyCache {
    /// Open a multiplexed connection, giving up after `timeout`.
    ///
    /// The connection string may carry credentials and is never logged.
    ///
    /// # Errors
    ///
    /// Returns `KeyCacheError::Backend` if the URL is invalid, the server is
    /// unreachable, or the attempt times out.
    pub async fn connect(redis_url: &SecretString, timeout: Duration) -> Result<Self, KeyCacheError> {
        let client = Client::open(redis_url.expose_secret()).map_err(|e| {
            tracing::error!(target: "os.auth.cache", error = %e, "Failed to open Redis client");
            KeyCacheError::Backend(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                tracing::error!(
                    target: "os.auth.cache",
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out connecting to Redis"
                );
                KeyCacheError::Backend("Timed out connecting to Redis".to_string())
            })?
            .map_err(|e| {
                tracing::error!(target: "os.auth.cache", error = %e, "Failed to connect to Redis");
                KeyCacheError::Backend(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }

    /// Best-effort delete used when a stored record turns out to be unusable.
    async fn evict(&self, key: &str) {
        let mut conn = self.connection.clone();
        let result =
            with_operation_timeout::<(), _>(REDIS_OPERATION_TIMEOUT, "DEL", conn.del(key)).await;
        if let Err(e) = result {
            tracing::warn!(target: "os.auth.cache", error = %e, "Failed to evict corrupt cache entry");
        }
    }
}

#[async_trait]
impl JwksKeyCache for RedisJwksKeyCache {
    #[instrument(skip_all, name = "os.cache.redis.get")]
    async fn try_get(&self, kid: &str) -> Option<CachedKeyEntry> {
        let mut conn = self.connection.clone();
        let key = cache_key(kid);

        let read = with_operation_timeout(
            REDIS_OPERATION_TIMEOUT,
            "GET",
            conn.get::<_, Option<String>>(&key),
        )
        .await;
        let raw = match read {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    target: "os.auth.cache",
                    kid = %kid,
                    error = %e,
                    "Redis read failed, treating as cache miss"
                );
                return None;
            }
        };
        let raw = raw?;

        let record: StoredKeyRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(target: "os.auth.cache", kid = %kid, error = %e, "Evicting undecodable cache record");
                self.evict(&key).await;
                return None;
            }
        };

        match decoding_key_from_jwk(&record.jwk) {
            Ok(decoding_key) => Some(CachedKeyEntry {
                jwk: record.jwk,
                decoding_key,
                cached_at: record.cached_at,
                expires_at: record.expires_at,
            }),
            Err(e) => {
                tracing::warn!(target: "os.auth.cache", kid = %kid, error = %e, "Evicting unusable cached key");
                self.evict(&key).await;
                None
            }
        }
    }

    #[instrument(skip_all, name = "os.cache.redis.set")]
    async fn set(&self, kid: &str, jwk: &Jwk, ttl: Duration) -> Result<(), KeyCacheError> {
        if ttl.is_zero() {
            return self.remove(kid).await;
        }

        let cached_at = Utc::now();
        let record = StoredKeyRecord {
            jwk: jwk.clone(),
            cached_at,
            expires_at: wall_clock_expiry(cached_at, ttl),
        };
        let value = serde_json::to_string(&record)
            .map_err(|e| KeyCacheError::Serialization(e.to_string()))?;

        let mut conn = self.connection.clone();
        let mut command = redis::cmd("SET");
        command
            .arg(cache_key(kid))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl));
        with_operation_timeout::<(), _>(
            REDIS_OPERATION_TIMEOUT,
            "SET",
            command.query_async(&mut conn),
        )
        .await
        .map_err(|e| {
            tracing::warn!(target: "os.auth.cache", kid = %kid, error = %e, "Failed to store key in Redis");
            e
        })
    }

    #[instrument(skip_all, name = "os.cache.redis.remove")]
    async fn remove(&self, kid: &str) -> Result<(), KeyCacheError> {
        let mut conn = self.connection.clone();
        with_operation_timeout::<(), _>(REDIS_OPERATION_TIMEOUT, "DEL", conn.del(cache_key(kid)))
            .await
            .map_err(|e| {
                tracing::warn!(target: "os.auth.cache", kid = %kid, error = %e, "Failed to remove key from Redis");
                e
            })
    }

    fn backend(&self) -> &'static str {
        "distributed"
    }
}
