//! Current-user endpoint.

use crate::errors::OrderServiceError;
use crate::middleware::auth::ClaimsExt;
use axum::{extract::Request, Json};
use common::jwt::{TokenType, VerifiedClaims};
use serde::Serialize;
use tracing::instrument;

/// Identity of the caller as asserted by their access token.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub session_id: String,
    pub token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<&VerifiedClaims> for MeResponse {
    fn from(claims: &VerifiedClaims) -> Self {
        let set = &claims.claims;
        Self {
            user_id: set.sub.clone(),
            email: set.email.clone(),
            session_id: set.session_id.clone(),
            token_type: set.token_type,
            username: set.custom_str("username").map(str::to_string),
            role: set.custom_str("role").map(str::to_string),
            tenant_id: set.custom_str("tenant_id").map(str::to_string),
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// Handler for GET /api/v1/me
///
/// Must sit behind `require_auth`. Missing claims mean the route was wired
/// without it and yield a 500.
#[instrument(skip_all, name = "os.me.get")]
pub async fn get_me(req: Request) -> Result<Json<MeResponse>, OrderServiceError> {
    let claims = req.claims().ok_or_else(|| {
        tracing::error!(target: "os.handlers.me", "Verified claims missing from request");
        OrderServiceError::Internal
    })?;

    Ok(Json(MeResponse::from(claims)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_unauthenticated_route_is_internal_error() {
        let app = Router::new().route("/api/v1/me", get(get_me));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
