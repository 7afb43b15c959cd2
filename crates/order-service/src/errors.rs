//! Order service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Client
//! messages are generic; details are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::JwtValidationError;
use serde::Serialize;
use thiserror::Error;

/// Message returned for every rejected bearer token.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Order service error type.
///
/// - InvalidToken: 401 Unauthorized
/// - ServiceUnavailable: 503 Service Unavailable
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl OrderServiceError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            OrderServiceError::InvalidToken(_) => 401,
            OrderServiceError::ServiceUnavailable(_) => 503,
            OrderServiceError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for OrderServiceError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            OrderServiceError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            OrderServiceError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "os.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            OrderServiceError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"order-service\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Token rejections become 401 with a single generic message, except an
/// unreachable authority which is 503.
impl From<JwtValidationError> for OrderServiceError {
    fn from(err: JwtValidationError) -> Self {
        match err {
            JwtValidationError::UpstreamFetchFailure => {
                OrderServiceError::ServiceUnavailable(err.to_string())
            }
            _ => OrderServiceError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()),
        }
    }
}
