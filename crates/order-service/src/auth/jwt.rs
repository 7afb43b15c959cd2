//! Bearer token verification for the order service.
//!
//! Validates incoming RS256 JWTs against keys resolved through the
//! [`KeyRefreshCoordinator`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only RS256 is accepted
//! - `exp` is validated with clock skew leeway; `iat` may not be in the future
//! - Callers map every rejection except `UpstreamFetchFailure` to one generic message

use crate::auth::jwks::KeyRefreshCoordinator;
use crate::config::Config;
use crate::observability::metrics::record_token_validation;
use common::jwt::{extract_kid, verify_rs256, JwtValidationError, TokenExpectations, VerifiedClaims};
use std::sync::Arc;
use tracing::instrument;

pub struct TokenVerifier {
    coordinator: Arc<KeyRefreshCoordinator>,
    expectations: TokenExpectations,
}

impl TokenVerifier {
    pub fn new(coordinator: Arc<KeyRefreshCoordinator>, expectations: TokenExpectations) -> Self {
        Self {
            coordinator,
            expectations,
        }
    }

    pub fn from_config(coordinator: Arc<KeyRefreshCoordinator>, config: &Config) -> Self {
        Self::new(
            coordinator,
            TokenExpectations {
                issuer: config.jwt_issuer.clone(),
                audience: config.jwt_audience.clone(),
                clock_skew: config.jwt_clock_skew,
            },
        )
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    ///
    /// - `TokenTooLarge` / `MalformedToken` / `MissingKeyId` - header unusable
    /// - `UnknownKey` - no key for the `kid`, even after any allowed refresh
    /// - `UpstreamFetchFailure` - no key and the last JWKS fetch failed
    /// - `ExpiredToken` / `InvalidSignature` / `InvalidClaims` - see [`verify_rs256`]
    #[instrument(skip_all, name = "os.auth.verify")]
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, JwtValidationError> {
        let result = self.verify_inner(token).await;

        match &result {
            Ok(_) => {
                record_token_validation("success", None);
                tracing::debug!(target: "os.auth.jwt", "Token validated successfully");
            }
            Err(e) => {
                record_token_validation("error", Some(e.error_type()));
                tracing::debug!(target: "os.auth.jwt", error_type = e.error_type(), "Token rejected");
            }
        }

        result
    }

    async fn verify_inner(&self, token: &str) -> Result<VerifiedClaims, JwtValidationError> {
        let kid = extract_kid(token)?;

        let Some(entry) = self.coordinator.get_signing_key(&kid).await else {
            if self.coordinator.last_refresh_failed().await {
                tracing::warn!(target: "os.auth.jwt", kid = %kid, "Signing key unavailable, JWKS fetch failing");
                return Err(JwtValidationError::UpstreamFetchFailure);
            }
            return Err(JwtValidationError::UnknownKey);
        };

        verify_rs256(token, &entry.decoding_key, &self.expectations)
    }

    pub fn expectations(&self) -> &TokenExpectations {
        &self.expectations
    }
}
