//! HTTP routes for the user service.

use crate::config::Config;
use crate::crypto::SigningKeyMaterial;
use crate::handlers;
use crate::services::TokenIssuer;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    /// Signs with the key loaded once at startup.
    pub token_issuer: TokenIssuer,
}

impl AppState {
    pub fn new(config: Config, signing_key: Arc<SigningKeyMaterial>) -> Self {
        let token_issuer = TokenIssuer::new(signing_key, &config);
        Self {
            config,
            token_issuer,
        }
    }
}

/// Build the application routes.
///
/// - `/.well-known/jwks.json` - public signing key (RFC 8414 well-known path)
/// - `/health` - liveness check
/// - `/metrics` - Prometheus scrape endpoint
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/.well-known/jwks.json", get(handlers::handle_get_jwks))
        .route("/health", get(handlers::health_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    public_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use common::testing::primary;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_router() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("rsa_key.pem");
        std::fs::write(&key_path, &primary().private_key_pem).unwrap();

        let config = Config::from_vars(&HashMap::from([(
            "JWT_SIGNING_KEY_PATH".to_string(),
            key_path.display().to_string(),
        )]))
        .unwrap();
        let key = SigningKeyMaterial::load_or_generate(&config.signing_key_path).unwrap();
        let state = Arc::new(AppState::new(config, Arc::new(key)));

        let handle = PrometheusBuilder::new().build_recorder().handle();
        (build_routes(state, handle), dir)
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (app, _dir) = test_router();

        let response = app
            .oneshot(Request::builder().uri("/token").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_jwks_route_rejects_post() {
        let (app, _dir) = test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/.well-known/jwks.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
