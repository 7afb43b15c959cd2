//! Token issuing.
//!
//! [`TokenIssuer`] wraps the signing key with the authority's issuer,
//! audience and validity settings. Callers supply a [`ClaimSet`]; the
//! registered claims (`iss`, `aud`, `exp`, `iat`) are always set here and
//! cannot be overridden through custom claims.

use crate::config::Config;
use crate::crypto::SigningKeyMaterial;
use crate::errors::UserServiceError;
use crate::observability::metrics::record_token_issuance;
use chrono::{DateTime, Utc};
use common::jwks::JwkSet;
use common::jwt::{
    extract_kid, verify_rs256, ClaimSet, JwtValidationError, TokenClaims, TokenExpectations,
    TokenType, VerifiedClaims,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Identity of the user a token is minted for.
#[derive(Clone, Default)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
    pub session_id: String,
    pub username: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub role: Option<String>,
    pub tenant_id: Option<String>,
    pub timezone: Option<String>,
    pub is_active: Option<bool>,
    pub status: Option<String>,
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("user_id", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("session_id", &"[REDACTED]")
            .field("role", &self.role)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl UserIdentity {
    fn claim_set(&self, token_type: TokenType) -> ClaimSet {
        let mut claims = ClaimSet::new(
            self.user_id.clone(),
            self.email.clone(),
            self.session_id.clone(),
            token_type,
        );

        let optional = [
            ("username", &self.username),
            ("given_name", &self.given_name),
            ("family_name", &self.family_name),
            ("role", &self.role),
            ("tenant_id", &self.tenant_id),
            ("timezone", &self.timezone),
            ("status", &self.status),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                claims = claims.with_claim(name, value.clone());
            }
        }
        if let Some(is_active) = self.is_active {
            claims = claims.with_claim("is_active", is_active);
        }

        claims
    }
}

/// A signed token and the instant it stops being valid.
#[derive(Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints and verifies tokens for this authority.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    key: Arc<SigningKeyMaterial>,
    issuer: String,
    audience: String,
    clock_skew: Duration,
    access_token_validity: Duration,
    refresh_token_validity: Duration,
}

impl TokenIssuer {
    pub fn new(key: Arc<SigningKeyMaterial>, config: &Config) -> Self {
        Self {
            key,
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            clock_skew: config.jwt_clock_skew,
            access_token_validity: config.access_token_validity,
            refresh_token_validity: config.refresh_token_validity,
        }
    }

    /// Sign `claims` valid for `validity` from now.
    ///
    /// # Errors
    ///
    /// Returns `Crypto` if signing fails, `Internal` if `validity` overflows
    /// the timestamp range.
    pub fn sign(&self, claims: ClaimSet, validity: Duration) -> Result<String, UserServiceError> {
        self.sign_at(claims, validity, Utc::now())
            .map(|issued| issued.token)
    }

    /// Sign `claims` as if issued at `issued_at`.
    ///
    /// # Errors
    ///
    /// Same as [`TokenIssuer::sign`].
    #[instrument(skip_all, name = "us.token.sign")]
    pub fn sign_at(
        &self,
        mut claims: ClaimSet,
        validity: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, UserServiceError> {
        claims.strip_reserved();

        let validity_secs = i64::try_from(validity.as_secs()).map_err(|_| {
            tracing::error!(target: "us.token", "Token validity out of range");
            UserServiceError::Internal
        })?;
        let iat = issued_at.timestamp();
        let exp = iat.checked_add(validity_secs).ok_or_else(|| {
            tracing::error!(target: "us.token", "Token expiry out of range");
            UserServiceError::Internal
        })?;
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0).ok_or(UserServiceError::Internal)?;

        let token_claims = TokenClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp,
            iat,
            claims,
        };

        let token = self.key.sign_claims(&token_claims)?;

        tracing::debug!(
            target: "us.token",
            kid = %self.key.key_id(),
            exp = exp,
            "Token signed"
        );

        Ok(IssuedToken { token, expires_at })
    }

    /// Issue an access token with the configured access validity.
    ///
    /// # Errors
    ///
    /// Same as [`TokenIssuer::sign`].
    pub fn issue_access_token(&self, user: &UserIdentity) -> Result<IssuedToken, UserServiceError> {
        self.issue(user, TokenType::Access, self.access_token_validity)
    }

    /// Issue a refresh token with the configured refresh validity.
    ///
    /// # Errors
    ///
    /// Same as [`TokenIssuer::sign`].
    pub fn issue_refresh_token(&self, user: &UserIdentity) -> Result<IssuedToken, UserServiceError> {
        self.issue(user, TokenType::Refresh, self.refresh_token_validity)
    }

    fn issue(
        &self,
        user: &UserIdentity,
        token_type: TokenType,
        validity: Duration,
    ) -> Result<IssuedToken, UserServiceError> {
        let start = Instant::now();
        let result = self.sign_at(user.claim_set(token_type), validity, Utc::now());

        let status = if result.is_ok() { "success" } else { "error" };
        record_token_issuance(token_type.as_str(), status, start.elapsed());

        result
    }

    /// Verify a token against this authority's own public key.
    ///
    /// # Errors
    ///
    /// Returns the [`JwtValidationError`] describing why the token was
    /// rejected. A token signed under a different `kid` is `UnknownKey`.
    #[instrument(skip_all, name = "us.token.verify")]
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, JwtValidationError> {
        let kid = extract_kid(token)?;
        if kid != self.key.key_id() {
            tracing::debug!(target: "us.token", "Token signed under a foreign key id");
            return Err(JwtValidationError::UnknownKey);
        }

        let expectations = TokenExpectations {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            clock_skew: self.clock_skew,
        };
        verify_rs256(token, self.key.decoding_key(), &expectations)
    }

    /// The public JWKS document for this authority.
    pub fn jwks(&self) -> JwkSet {
        self.key.publish_jwks()
    }

    pub fn key_id(&self) -> &str {
        self.key.key_id()
    }
}
