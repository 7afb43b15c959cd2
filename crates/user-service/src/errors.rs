//! User service error types.
//!
//! Errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! returned to clients are generic; the underlying cause is logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Key storage error: {0}")]
    KeyStorage(String),

    #[error("Internal server error")]
    Internal,
}

impl UserServiceError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            UserServiceError::Crypto(_)
            | UserServiceError::KeyStorage(_)
            | UserServiceError::Internal => 500,
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

impl IntoResponse for UserServiceError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            UserServiceError::Crypto(err) => {
                tracing::error!(target: "us.crypto", error = %err, "Cryptographic operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CRYPTO_ERROR",
                    "An internal cryptographic error occurred".to_string(),
                )
            }
            UserServiceError::KeyStorage(err) => {
                tracing::error!(target: "us.crypto", error = %err, "Signing key storage failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            UserServiceError::Internal => (
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

        (status, Json(error_response)).into_response()
    }
}

impl From<std::io::Error> for UserServiceError {
    fn from(err: std::io::Error) -> Self {
        UserServiceError::KeyStorage(err.to_string())
    }
}
