//! Process-local JWKS key cache.

use crate::auth::key_cache::{wall_clock_expiry, CachedKeyEntry, JwksKeyCache, KeyCacheError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::jwks::{decoding_key_from_jwk, Jwk};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct MemoryEntry {
    jwk: Jwk,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    /// Monotonic deadline; the entry is valid while `now < deadline`.
    deadline: Instant,
}

/// `HashMap` of keys behind a single async mutex.
///
/// Expiry uses `tokio::time::Instant`, so paused-time tests can advance
/// past a TTL without sleeping.
#[derive(Default)]
pub struct InMemoryJwksKeyCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl InMemoryJwksKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones not yet found expired.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl JwksKeyCache for InMemoryJwksKeyCache {
    async fn try_get(&self, kid: &str) -> Option<CachedKeyEntry> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(kid)?;

        if Instant::now() >= entry.deadline {
            entries.remove(kid);
            tracing::debug!(target: "os.auth.cache", kid = %kid, "Cached key expired");
            return None;
        }

        match decoding_key_from_jwk(&entry.jwk) {
            Ok(decoding_key) => Some(CachedKeyEntry {
                jwk: entry.jwk.clone(),
                decoding_key,
                cached_at: entry.cached_at,
                expires_at: entry.expires_at,
            }),
            Err(e) => {
                entries.remove(kid);
                tracing::warn!(
                    target: "os.auth.cache",
                    kid = %kid,
                    error = %e,
                    "Evicted unusable cached key"
                );
                None
            }
        }
    }

    async fn set(&self, kid: &str, jwk: &Jwk, ttl: Duration) -> Result<(), KeyCacheError> {
        if ttl.is_zero() {
            return self.remove(kid).await;
        }

        let cached_at = Utc::now();
        let deadline = Instant::now()
            .checked_add(ttl)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400 * 365 * 30));

        let entry = MemoryEntry {
            jwk: jwk.clone(),
            cached_at,
            expires_at: wall_clock_expiry(cached_at, ttl),
            deadline,
        };

        self.entries.lock().await.insert(kid.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, kid: &str) -> Result<(), KeyCacheError> {
        self.entries.lock().await.remove(kid);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "in_memory"
    }
}
