//! JWKS refresh coordination.
//!
//! [`KeyRefreshCoordinator`] implements cache-aside lookup of signing keys:
//! a cache hit is served directly; a miss triggers a fetch of the
//! authority's `/.well-known/jwks.json` (at most once per refresh interval)
//! and every usable RSA key is written back to the cache with a fixed TTL.
//!
//! # Single-flight
//!
//! Refreshes are serialized by an async mutex. A completed-refresh counter
//! is sampled before waiting on the lock; if it moved by the time the lock
//! is acquired, another caller already refreshed and this caller returns
//! [`RefreshOutcome::Joined`] without a second request.
//!
//! On the lookup path the counter is sampled before the cache read and the
//! interval check. A refresh records its completion time before bumping the
//! counter, so a caller that observes the new count also observes the
//! closed gate. Concurrent misses for an unknown `kid` therefore cost one
//! upstream fetch.

use crate::auth::key_cache::{CachedKeyEntry, JwksKeyCache};
use crate::config::Config;
use crate::observability::metrics::{
    record_jwks_refresh, record_key_cache_lookup, set_jwks_keys_cached,
};
use common::jwks::{decoding_key_from_jwk, JwkSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::instrument;

/// Connect timeout for the JWKS HTTP client.
const JWKS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for fetching and caching keys.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub jwks_url: String,

    /// Minimum spacing between on-demand refreshes.
    pub refresh_interval: Duration,

    /// TTL passed to the cache for every stored key.
    pub key_ttl: Duration,

    /// Per-request timeout for the fetch.
    pub fetch_timeout: Duration,
}

impl RefreshSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwks_url: config.jwks_url.clone(),
            refresh_interval: config.jwks_refresh_interval,
            key_ttl: config.jwks_cache_ttl,
            fetch_timeout: config.jwks_fetch_timeout,
        }
    }
}

/// Result of a [`KeyRefreshCoordinator::refresh_keys`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call fetched the JWKS. `skipped` counts keys that were not
    /// usable RSA signing keys or could not be stored.
    Refreshed { stored: usize, skipped: usize },

    /// Another caller completed a refresh while this one waited.
    Joined,

    /// The fetch or parse failed; the cache was left untouched.
    Failed,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Refreshed { .. } => "refreshed",
            RefreshOutcome::Joined => "joined",
            RefreshOutcome::Failed => "failed",
        }
    }
}

/// Errors constructing a [`KeyRefreshCoordinator`].
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Failed to build JWKS HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Default)]
struct RefreshState {
    /// Time of the last successful refresh.
    last_refresh: Option<Instant>,
    last_refresh_failed: bool,
}

/// Resolves signing keys by `kid`, refreshing the cache from the JWKS
/// endpoint on demand.
pub struct KeyRefreshCoordinator {
    cache: Arc<dyn JwksKeyCache>,
    http_client: reqwest::Client,
    settings: RefreshSettings,
    refresh_lock: Mutex<()>,
    completed_refreshes: AtomicU64,
    state: RwLock<RefreshState>,
}

impl KeyRefreshCoordinator {
    /// Build a coordinator whose HTTP client enforces `settings.fetch_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::HttpClient` if the client cannot be built.
    pub fn new(
        cache: Arc<dyn JwksKeyCache>,
        settings: RefreshSettings,
    ) -> Result<Self, CoordinatorError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .connect_timeout(JWKS_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!(target: "os.auth.jwks", error = %e, "Failed to build JWKS HTTP client");
                CoordinatorError::HttpClient(e.to_string())
            })?;

        Ok(Self {
            cache,
            http_client,
            settings,
            refresh_lock: Mutex::new(()),
            completed_refreshes: AtomicU64::new(0),
            state: RwLock::new(RefreshState::default()),
        })
    }

    /// Look up the key for `kid`, refreshing on a miss if the refresh
    /// interval allows it.
    ///
    /// Returns `None` when the key is unknown after any refresh, or when the
    /// interval gate suppressed the refresh.
    #[instrument(skip_all, name = "os.auth.jwks.get_key", fields(kid = %kid))]
    pub async fn get_signing_key(&self, kid: &str) -> Option<CachedKeyEntry> {
        let backend = self.cache.backend();
        let observed = self.completed_refreshes.load(Ordering::Acquire);

        if let Some(entry) = self.cache.try_get(kid).await {
            record_key_cache_lookup(backend, true);
            tracing::debug!(target: "os.auth.jwks", kid = %kid, "JWKS cache hit");
            return Some(entry);
        }
        record_key_cache_lookup(backend, false);

        if !self.refresh_allowed().await {
            tracing::debug!(
                target: "os.auth.jwks",
                kid = %kid,
                "Key not cached and refresh interval not elapsed"
            );
            return None;
        }

        self.refresh_after(observed).await;

        let entry = self.cache.try_get(kid).await;
        if entry.is_none() {
            tracing::warn!(target: "os.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        }
        entry
    }

    /// Fetch the JWKS and store every usable key. Never returns an error;
    /// failures are logged and reported as [`RefreshOutcome::Failed`].
    pub async fn refresh_keys(&self) -> RefreshOutcome {
        self.refresh_after(self.completed_refreshes.load(Ordering::Acquire))
            .await
    }

    /// Refresh unless a refresh has completed since the counter read
    /// `observed`.
    #[instrument(skip_all, name = "os.auth.jwks.refresh")]
    async fn refresh_after(&self, observed: u64) -> RefreshOutcome {
        let _guard = self.refresh_lock.lock().await;

        if self.completed_refreshes.load(Ordering::Acquire) != observed {
            tracing::debug!(target: "os.auth.jwks", "Joined a refresh completed by another caller");
            return RefreshOutcome::Joined;
        }

        let start = Instant::now();
        let outcome = match self.fetch_jwks().await {
            Ok(jwks) => {
                let outcome = self.store_keys(jwks).await;
                let mut state = self.state.write().await;
                state.last_refresh = Some(Instant::now());
                state.last_refresh_failed = false;
                outcome
            }
            Err(()) => {
                self.state.write().await.last_refresh_failed = true;
                RefreshOutcome::Failed
            }
        };

        self.completed_refreshes.fetch_add(1, Ordering::Release);
        record_jwks_refresh(outcome.as_str(), start.elapsed());

        outcome
    }

    /// Whether the most recent refresh attempt failed.
    pub async fn last_refresh_failed(&self) -> bool {
        self.state.read().await.last_refresh_failed
    }

    /// Name of the active cache backend.
    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend()
    }

    async fn refresh_allowed(&self) -> bool {
        match self.state.read().await.last_refresh {
            None => true,
            Some(last) => last.elapsed() >= self.settings.refresh_interval,
        }
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, ()> {
        tracing::debug!(target: "os.auth.jwks", url = %self.settings.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.settings.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "os.auth.jwks", error = %e, "Failed to fetch JWKS");
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "os.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(());
        }

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!(target: "os.auth.jwks", error = %e, "Failed to parse JWKS response");
        })
    }

    async fn store_keys(&self, jwks: JwkSet) -> RefreshOutcome {
        let mut stored = 0;
        let mut skipped = 0;

        for jwk in jwks.keys {
            if !jwk.is_rsa_signing_key() {
                tracing::debug!(
                    target: "os.auth.jwks",
                    kid = %jwk.kid,
                    kty = %jwk.kty,
                    "Skipping non-RSA-signing key"
                );
                skipped += 1;
                continue;
            }

            if let Err(e) = decoding_key_from_jwk(&jwk) {
                tracing::warn!(target: "os.auth.jwks", kid = %jwk.kid, error = %e, "Skipping unusable RSA key");
                skipped += 1;
                continue;
            }

            match self.cache.set(&jwk.kid, &jwk, self.settings.key_ttl).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    tracing::warn!(target: "os.auth.jwks", kid = %jwk.kid, error = %e, "Failed to cache key");
                    skipped += 1;
                }
            }
        }

        set_jwks_keys_cached(stored);
        tracing::info!(
            target: "os.auth.jwks",
            stored = stored,
            skipped = skipped,
            backend = self.cache.backend(),
            "JWKS cache refreshed"
        );

        RefreshOutcome::Refreshed { stored, skipped }
    }
}
