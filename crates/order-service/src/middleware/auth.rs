//! Authentication middleware for protected routes.
//!
//! `require_auth` extracts the Bearer token from the Authorization header,
//! verifies it with the [`TokenVerifier`], and stores the resulting
//! [`VerifiedClaims`] in request extensions for downstream handlers. Only
//! access tokens are admitted; refresh tokens are for the user service.

use crate::auth::TokenVerifier;
use crate::errors::{OrderServiceError, INVALID_TOKEN_MESSAGE};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use common::jwt::{TokenType, VerifiedClaims};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
}

fn extract_bearer_token(req: &Request) -> Result<&str, OrderServiceError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "os.middleware.auth", "Missing Authorization header");
            OrderServiceError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "os.middleware.auth", "Invalid Authorization header format");
        OrderServiceError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 Unauthorized if the token is missing, rejected, or not an access token
/// - 503 Service Unavailable if the signing key cannot be fetched
/// - Otherwise continues with `VerifiedClaims` in extensions
#[instrument(skip_all, name = "os.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, OrderServiceError> {
    let token = extract_bearer_token(&req)?;

    let claims = state.verifier.verify(token).await?;

    if claims.claims.token_type != TokenType::Access {
        tracing::debug!(
            target: "os.middleware.auth",
            token_type = claims.claims.token_type.as_str(),
            "Rejected non-access token"
        );
        return Err(OrderServiceError::InvalidToken(
            INVALID_TOKEN_MESSAGE.to_string(),
        ));
    }

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extension trait for reading verified claims from a request.
pub trait ClaimsExt {
    /// Returns `None` if `require_auth` did not run for this request.
    fn claims(&self) -> Option<&VerifiedClaims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&VerifiedClaims> {
        self.extensions().get::<VerifiedClaims>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{InMemoryJwksKeyCache, KeyRefreshCoordinator, RefreshSettings};
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use common::jwt::{TokenExpectations, DEFAULT_CLOCK_SKEW};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn protected(req: Request) -> String {
        req.claims()
            .map(|c| c.claims.sub.clone())
            .unwrap_or_default()
    }

    fn test_app() -> Router {
        // Never contacted: every request in these tests fails before key lookup
        let coordinator = KeyRefreshCoordinator::new(
            Arc::new(InMemoryJwksKeyCache::new()),
            RefreshSettings {
                jwks_url: "http://127.0.0.1:1/.well-known/jwks.json".to_string(),
                refresh_interval: Duration::from_secs(300),
                key_ttl: Duration::from_secs(600),
                fetch_timeout: Duration::from_secs(1),
            },
        )
        .unwrap();
        let verifier = TokenVerifier::new(
            Arc::new(coordinator),
            TokenExpectations {
                issuer: "user-service".to_string(),
                audience: "order-service".to_string(),
                clock_skew: DEFAULT_CLOCK_SKEW,
            },
        );
        let state = Arc::new(AuthState {
            verifier: Arc::new(verifier),
        });

        Router::new()
            .route("/protected", get(protected))
            .route_layer(middleware::from_fn_with_state(state, require_auth))
    }

    async fn send(auth_header: Option<&str>) -> axum::response::Response {
        let mut builder = axum::http::Request::builder().uri("/protected");
        if let Some(value) = auth_header {
            builder = builder.header("authorization", value);
        }
        test_app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let response = send(None).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("WWW-Authenticate"));
    }

    #[tokio::test]
    async fn test_basic_scheme_rejected() {
        let response = send(Some("Basic dXNlcjpwYXNz")).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let response = send(Some("Bearer not-a-jwt")).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
