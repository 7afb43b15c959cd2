//! Periodic JWKS refresh task.
//!
//! Keeps the key cache warm so that request-path lookups rarely miss. The
//! task refreshes once on start and then every `interval`.
//!
//! # Graceful Shutdown
//!
//! `stop()` cancels the task's token and waits for it to exit. Cancellation
//! is only observed while sleeping, so a fetch that is already in flight
//! runs to completion (bounded by the fetch timeout) before the task exits.
//! The handle lock is held until the task has exited, so a `start()` racing
//! a `stop()` never overlaps two loops.

use crate::auth::KeyRefreshCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

struct RunningTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Start/stop handle around the refresh loop.
pub struct BackgroundRefresher {
    coordinator: Arc<KeyRefreshCoordinator>,
    interval: Duration,
    running: Mutex<Option<RunningTask>>,
}

impl BackgroundRefresher {
    pub fn new(coordinator: Arc<KeyRefreshCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Spawn the refresh loop. Returns `false` (and does nothing) if it is
    /// already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::warn!(target: "os.tasks.jwks_refresher", "JWKS refresher already running");
            return false;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(
            run_refresh_loop(
                Arc::clone(&self.coordinator),
                self.interval,
                cancel_token.clone(),
            )
            .instrument(tracing::info_span!("os.tasks.jwks_refresher")),
        );

        tracing::info!(
            target: "os.tasks.jwks_refresher",
            interval_secs = self.interval.as_secs(),
            "JWKS refresher started"
        );

        *running = Some(RunningTask {
            cancel_token,
            handle,
        });
        true
    }

    /// Cancel the loop and wait for it to exit. Returns `false` (and does
    /// nothing) if it is not running.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(task) = running.take() else {
            tracing::warn!(target: "os.tasks.jwks_refresher", "JWKS refresher not running");
            return false;
        };

        task.cancel_token.cancel();
        if let Err(e) = task.handle.await {
            tracing::error!(target: "os.tasks.jwks_refresher", error = %e, "JWKS refresher task failed");
        }

        tracing::info!(target: "os.tasks.jwks_refresher", "JWKS refresher stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

async fn run_refresh_loop(
    coordinator: Arc<KeyRefreshCoordinator>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let outcome = coordinator.refresh_keys().await;
    tracing::debug!(target: "os.tasks.jwks_refresher", outcome = outcome.as_str(), "Initial JWKS refresh");

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                tracing::info!(
                    target: "os.tasks.jwks_refresher",
                    "JWKS refresher received shutdown signal, exiting"
                );
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let outcome = coordinator.refresh_keys().await;
                tracing::debug!(target: "os.tasks.jwks_refresher", outcome = outcome.as_str(), "Periodic JWKS refresh");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{InMemoryJwksKeyCache, RefreshSettings};
    use common::testing::{test_jwk, TEST_KEY_ID};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JWKS_PATH: &str = "/.well-known/jwks.json";

    async fn setup(interval: Duration) -> (MockServer, Arc<KeyRefreshCoordinator>) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "keys": [test_jwk(TEST_KEY_ID)] })),
            )
            .mount(&server)
            .await;

        let coordinator = Arc::new(KeyRefreshCoordinator::new(
            Arc::new(InMemoryJwksKeyCache::new()),
            RefreshSettings {
                jwks_url: format!("{}{}", server.uri(), JWKS_PATH),
                refresh_interval: interval,
                key_ttl: Duration::from_secs(600),
                fetch_timeout: Duration::from_secs(5),
            },
        )
        .unwrap());
        (server, coordinator)
    }

    async fn fetch_count(server: &MockServer) -> usize {
        server.received_requests().await.unwrap_or_default().len()
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let (_server, coordinator) = setup(Duration::from_secs(300)).await;
        let refresher = BackgroundRefresher::new(coordinator, Duration::from_secs(300));

        assert!(!refresher.is_running().await);
        assert!(!refresher.stop().await, "stop before start is a no-op");

        assert!(refresher.start().await);
        assert!(!refresher.start().await, "second start is a no-op");
        assert!(refresher.is_running().await);

        assert!(refresher.stop().await);
        assert!(!refresher.stop().await, "second stop is a no-op");
        assert!(!refresher.is_running().await);
    }

    #[tokio::test]
    async fn test_initial_refresh_populates_cache() {
        let (server, coordinator) = setup(Duration::from_secs(300)).await;
        let refresher = BackgroundRefresher::new(Arc::clone(&coordinator), Duration::from_secs(300));

        refresher.start().await;
        for _ in 0..50 {
            if fetch_count(&server).await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        refresher.stop().await;

        assert_eq!(fetch_count(&server).await, 1);
        // Served from the cache; the gate would block a second fetch anyway
        assert!(coordinator.get_signing_key(TEST_KEY_ID).await.is_some());
        assert_eq!(fetch_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_refreshes_periodically_and_stops() {
        let (server, coordinator) = setup(Duration::from_millis(30)).await;
        let refresher = BackgroundRefresher::new(coordinator, Duration::from_millis(30));

        refresher.start().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        refresher.stop().await;

        let after_stop = fetch_count(&server).await;
        assert!(after_stop >= 2, "expected several refreshes, got {after_stop}");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fetch_count(&server).await, after_stop, "no fetches after stop");
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (_server, coordinator) = setup(Duration::from_secs(300)).await;
        let refresher = BackgroundRefresher::new(coordinator, Duration::from_secs(300));

        assert!(refresher.start().await);
        assert!(refresher.stop().await);
        assert!(refresher.start().await);
        assert!(refresher.is_running().await);
        assert!(refresher.stop().await);
    }

    #[tokio::test]
    async fn test_start_racing_stop_waits_for_previous_loop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "keys": [test_jwk(TEST_KEY_ID)] }))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        let coordinator = Arc::new(
            KeyRefreshCoordinator::new(
                Arc::new(InMemoryJwksKeyCache::new()),
                RefreshSettings {
                    jwks_url: format!("{}{}", server.uri(), JWKS_PATH),
                    refresh_interval: Duration::from_secs(300),
                    key_ttl: Duration::from_secs(600),
                    fetch_timeout: Duration::from_secs(5),
                },
            )
            .unwrap(),
        );
        let refresher = BackgroundRefresher::new(coordinator, Duration::from_secs(3600));

        assert!(refresher.start().await);
        for _ in 0..100 {
            if fetch_count(&server).await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // The first loop's fetch is in flight. A loop that overlapped it
        // would join that refresh instead of fetching.
        let (stopped, started) = tokio::join!(refresher.stop(), refresher.start());
        assert!(stopped);
        assert!(started);
        assert!(refresher.is_running().await);

        for _ in 0..200 {
            if fetch_count(&server).await >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fetch_count(&server).await, 2);

        assert!(refresher.stop().await);
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_interval() {
        let (_server, coordinator) = setup(Duration::from_secs(3600)).await;
        let refresher = BackgroundRefresher::new(coordinator, Duration::from_secs(3600));

        refresher.start().await;
        let stopped = tokio::time::timeout(Duration::from_secs(5), refresher.stop()).await;

        assert_eq!(stopped.ok(), Some(true));
    }
}
