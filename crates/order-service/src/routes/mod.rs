//! HTTP routes for the order service.

use crate::auth::{KeyRefreshCoordinator, TokenVerifier};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    /// Resolves keys through the coordinator shared with the background
    /// refresher.
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(config: Config, coordinator: Arc<KeyRefreshCoordinator>) -> Self {
        let verifier = Arc::new(TokenVerifier::from_config(coordinator, &config));
        Self { config, verifier }
    }
}

/// Build the application routes.
///
/// - `/health` - liveness check
/// - `/metrics` - Prometheus scrape endpoint
/// - `/api/v1/me` - caller identity, requires a valid bearer token
///
/// Layer order (outermost first): HTTP metrics, timeout, trace.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: Arc::clone(&state.verifier),
    });

    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    public_routes
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
