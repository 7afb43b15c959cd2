//! JWT utilities shared by the token authority and resource servers.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Key ID extraction from JWT headers
//! - The claim types carried by access and refresh tokens
//! - RS256 verification producing [`VerifiedClaims`]
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted; `none` and symmetric algorithms are rejected
//! - Generic error messages prevent information leakage
//! - `sub` and `email` are redacted in Debug output
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_kid, verify_rs256, TokenExpectations};
//!
//! let kid = extract_kid(token)?;
//! let key = lookup_decoding_key(&kid)?;
//! let claims = verify_rs256(token, &key, &expectations)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// cryptographic work. Typical access tokens here are 700-900 bytes
/// (RS256 signature plus profile claims).
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Applied as leeway to `exp` and as the allowance for `iat` in the future.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Configuration above this value is rejected.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Claim names set by the issuer that callers may not supply as custom claims.
pub const RESERVED_CLAIMS: &[&str] = &[
    "iss",
    "aud",
    "exp",
    "iat",
    "nbf",
    "sub",
    "email",
    "session_id",
    "token_type",
];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT validation.
///
/// Every variant renders the same client-facing message. The variant itself
/// carries the classification for logs and metrics.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not a structurally valid JWT.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header has no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKeyId,

    /// No published key matches the token's `kid`.
    #[error("The access token is invalid or expired")]
    UnknownKey,

    /// Token `exp` is in the past (beyond clock skew).
    #[error("The access token is invalid or expired")]
    ExpiredToken,

    /// Signature does not verify, or the algorithm is not RS256.
    #[error("The access token is invalid or expired")]
    InvalidSignature,

    /// Issuer, audience, required claims or `iat` are unacceptable.
    #[error("The access token is invalid or expired")]
    InvalidClaims,

    /// The key set could not be fetched from the authority.
    #[error("The authentication service is unavailable")]
    UpstreamFetchFailure,
}

impl JwtValidationError {
    /// Bounded label for metrics and structured logs.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            JwtValidationError::TokenTooLarge => "token_too_large",
            JwtValidationError::MalformedToken => "malformed_token",
            JwtValidationError::MissingKeyId => "missing_key_id",
            JwtValidationError::UnknownKey => "unknown_key",
            JwtValidationError::ExpiredToken => "expired_token",
            JwtValidationError::InvalidSignature => "invalid_signature",
            JwtValidationError::InvalidClaims => "invalid_claims",
            JwtValidationError::UpstreamFetchFailure => "upstream_fetch_failure",
        }
    }
}

// =============================================================================
// Claims Types
// =============================================================================

/// Kind of token, carried in the `token_type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token presented to resource servers.
    Access,
    /// Long-lived token exchanged for new access tokens.
    Refresh,
}

impl TokenType {
    /// Claim value, also used as a metrics label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Claims supplied by the caller when minting a token.
///
/// The issuer adds `iss`, `aud`, `exp` and `iat` on top of these. Any
/// additional profile claims (`username`, `role`, `tenant_id`, ...) live in
/// `custom` and are flattened into the token payload.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject (user identifier) - redacted in Debug output.
    pub sub: String,

    /// User email - redacted in Debug output.
    pub email: String,

    /// Login session the token belongs to.
    pub session_id: String,

    /// Access or refresh.
    pub token_type: TokenType,

    /// Free-form profile claims.
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSet")
            .field("sub", &"[REDACTED]")
            .field("email", &"[REDACTED]")
            .field("session_id", &self.session_id)
            .field("token_type", &self.token_type)
            .field("custom_claims", &self.custom.len())
            .finish()
    }
}

impl ClaimSet {
    /// Creates a claim set with no custom claims.
    #[must_use]
    pub fn new(sub: String, email: String, session_id: String, token_type: TokenType) -> Self {
        Self {
            sub,
            email,
            session_id,
            token_type,
            custom: serde_json::Map::new(),
        }
    }

    /// Adds a custom claim, ignoring reserved claim names.
    #[must_use]
    pub fn with_claim(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        if !RESERVED_CLAIMS.contains(&name) {
            self.custom.insert(name.to_string(), value.into());
        }
        self
    }

    /// Drops custom claims that would collide with issuer-controlled claims.
    pub fn strip_reserved(&mut self) {
        self.custom
            .retain(|name, _| !RESERVED_CLAIMS.contains(&name.as_str()));
    }

    /// Reads a custom string claim.
    #[must_use]
    pub fn custom_str(&self, name: &str) -> Option<&str> {
        self.custom.get(name).and_then(serde_json::Value::as_str)
    }
}

/// Full token payload: caller claims plus the registered claims.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,

    /// Audience.
    pub aud: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Caller-supplied claims.
    #[serde(flatten)]
    pub claims: ClaimSet,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("claims", &self.claims)
            .finish()
    }
}

/// Claims of a token whose signature and registered claims have been checked.
///
/// Only [`verify_rs256`] constructs this type, so holding one is proof that
/// verification succeeded.
#[derive(Clone, PartialEq)]
pub struct VerifiedClaims(TokenClaims);

impl Deref for VerifiedClaims {
    type Target = TokenClaims;

    fn deref(&self) -> &TokenClaims {
        &self.0
    }
}

impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerifiedClaims").field(&self.0).finish()
    }
}

/// What a verifier expects of every token it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExpectations {
    /// Required `iss` value.
    pub issuer: String,
    /// Required `aud` value.
    pub audience: String,
    /// Leeway for `exp` and allowance for future `iat`.
    pub clock_skew: Duration,
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// The token MUST still be verified once the key is resolved; the `kid` is
/// only used as a lookup into a trusted key set.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64 or invalid header JSON
/// - `MissingKeyId` - Header has no `kid`, or it is empty or not a string
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    check_size(token)?;

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKeyId)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::InvalidClaims` if `iat` is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let clock_skew_secs = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::InvalidClaims);
    }

    Ok(())
}

/// Verify an RS256 token against a public key and the caller's expectations.
///
/// Checks, in order: size, header algorithm (RS256 only), signature, `exp`
/// (with `clock_skew` leeway), `iss`, `aud`, required claims, and finally
/// `iat` not in the future.
///
/// # Errors
///
/// Returns the [`JwtValidationError`] variant matching the first failed check.
pub fn verify_rs256(
    token: &str,
    key: &DecodingKey,
    expectations: &TokenExpectations,
) -> Result<VerifiedClaims, JwtValidationError> {
    check_size(token)?;

    let header = decode_header(token).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header");
        JwtValidationError::MalformedToken
    })?;

    if header.alg != Algorithm::RS256 {
        tracing::debug!(
            target: "common.jwt",
            alg = ?header.alg,
            "Token rejected: algorithm not allowed"
        );
        return Err(JwtValidationError::InvalidSignature);
    }

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = true;
    validation.leeway = expectations.clock_skew.as_secs();
    validation.set_issuer(&[expectations.issuer.as_str()]);
    validation.set_audience(&[expectations.audience.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    let token_data = decode::<TokenClaims>(token, key, &validation).map_err(|e| {
        let mapped = map_decode_error(e.kind());
        tracing::debug!(
            target: "common.jwt",
            error = %e,
            error_type = mapped.error_type(),
            "Token verification failed"
        );
        mapped
    })?;

    validate_iat(token_data.claims.iat, expectations.clock_skew)?;

    Ok(VerifiedClaims(token_data.claims))
}

fn check_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }
    Ok(())
}

fn map_decode_error(kind: &ErrorKind) -> JwtValidationError {
    match kind {
        ErrorKind::ExpiredSignature => JwtValidationError::ExpiredToken,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_) => JwtValidationError::InvalidSignature,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::Json(_) => JwtValidationError::InvalidClaims,
        _ => JwtValidationError::MalformedToken,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::testing::{sign_test_token, test_decoding_key, TEST_KEY_ID};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn expectations() -> TokenExpectations {
        TokenExpectations {
            issuer: "user-service".to_string(),
            audience: "order-service".to_string(),
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    fn claims_at(iat: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            iss: "user-service".to_string(),
            aud: "order-service".to_string(),
            exp,
            iat,
            claims: ClaimSet::new(
                "user-42".to_string(),
                "ada@example.com".to_string(),
                "session-1".to_string(),
                TokenType::Access,
            )
            .with_claim("role", "admin"),
        }
    }

    fn valid_claims() -> TokenClaims {
        let now = chrono::Utc::now().timestamp();
        claims_at(now, now + 3600)
    }

    // -------------------------------------------------------------------------
    // extract_kid Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_kid_valid_token() {
        let header = r#"{"alg":"RS256","typ":"JWT","kid":"3f9a1c0b7e2d4a65"}"#;
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        let token = format!("{header_b64}.payload.signature");

        assert_eq!(extract_kid(&token).unwrap(), "3f9a1c0b7e2d4a65");
    }

    #[test]
    fn test_extract_kid_missing_kid() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let token = format!("{header_b64}.payload.signature");

        assert_eq!(extract_kid(&token), Err(JwtValidationError::MissingKeyId));
    }

    #[test]
    fn test_extract_kid_empty_kid() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":""}"#);
        let token = format!("{header_b64}.payload.signature");

        assert_eq!(extract_kid(&token), Err(JwtValidationError::MissingKeyId));
    }

    #[test]
    fn test_extract_kid_non_string_kid() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":12345}"#);
        let token = format!("{header_b64}.payload.signature");

        assert_eq!(extract_kid(&token), Err(JwtValidationError::MissingKeyId));
    }

    #[test]
    fn test_extract_kid_malformed_token() {
        assert_eq!(
            extract_kid("not-a-jwt"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(extract_kid(""), Err(JwtValidationError::MalformedToken));
        assert_eq!(
            extract_kid("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_extract_kid_invalid_base64_and_json() {
        assert_eq!(
            extract_kid("!!!invalid!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        );

        let header_b64 = URL_SAFE_NO_PAD.encode("not-json");
        assert_eq!(
            extract_kid(&format!("{header_b64}.payload.signature")),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_extract_kid_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            extract_kid(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_extract_kid_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(remaining - payload_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        assert_eq!(extract_kid(&token).unwrap(), "key");
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_and_past() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now - 3600, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert_eq!(
            validate_iat(far_future, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::InvalidClaims)
        );
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert_eq!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::InvalidClaims)
        );
    }

    // -------------------------------------------------------------------------
    // Claims Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_claims_debug_redacts_identity() {
        let claims = valid_claims();
        let debug_str = format!("{claims:?}");

        assert!(!debug_str.contains("user-42"));
        assert!(!debug_str.contains("ada@example.com"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_token_claims_flatten_custom_claims() {
        let claims = valid_claims();
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["role"], "admin");
        assert_eq!(json["token_type"], "access");
        assert_eq!(json["iss"], "user-service");

        let parsed: TokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, claims);
        assert!(!parsed.claims.custom.contains_key("iss"));
    }

    #[test]
    fn test_with_claim_ignores_reserved_names() {
        let claims = ClaimSet::new(
            "u".to_string(),
            "e".to_string(),
            "s".to_string(),
            TokenType::Refresh,
        )
        .with_claim("exp", 1)
        .with_claim("tenant_id", "acme");

        assert!(!claims.custom.contains_key("exp"));
        assert_eq!(claims.custom_str("tenant_id"), Some("acme"));
    }

    #[test]
    fn test_strip_reserved_removes_collisions() {
        let mut claims = ClaimSet::new(
            "u".to_string(),
            "e".to_string(),
            "s".to_string(),
            TokenType::Access,
        );
        claims
            .custom
            .insert("aud".to_string(), serde_json::Value::from("evil"));
        claims
            .custom
            .insert("username".to_string(), serde_json::Value::from("ada"));

        claims.strip_reserved();

        assert!(!claims.custom.contains_key("aud"));
        assert!(claims.custom.contains_key("username"));
    }

    // -------------------------------------------------------------------------
    // verify_rs256 Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_verify_rs256_accepts_valid_token() {
        let claims = valid_claims();
        let token = sign_test_token(&claims);

        let verified = verify_rs256(&token, &test_decoding_key(), &expectations()).unwrap();

        assert_eq!(*verified, claims);
        assert_eq!(verified.claims.custom_str("role"), Some("admin"));
    }

    #[test]
    fn test_verify_rs256_rejects_expired_token() {
        let now = chrono::Utc::now().timestamp();
        let token = sign_test_token(&claims_at(now - 7200, now - 3600));

        assert_eq!(
            verify_rs256(&token, &test_decoding_key(), &expectations()),
            Err(JwtValidationError::ExpiredToken)
        );
    }

    #[test]
    fn test_verify_rs256_expiry_within_leeway_is_accepted() {
        let now = chrono::Utc::now().timestamp();
        let token = sign_test_token(&claims_at(now - 600, now - 60));

        assert!(verify_rs256(&token, &test_decoding_key(), &expectations()).is_ok());
    }

    #[test]
    fn test_verify_rs256_rejects_wrong_issuer_and_audience() {
        let mut claims = valid_claims();
        claims.iss = "someone-else".to_string();
        let token = sign_test_token(&claims);
        assert_eq!(
            verify_rs256(&token, &test_decoding_key(), &expectations()),
            Err(JwtValidationError::InvalidClaims)
        );

        let mut claims = valid_claims();
        claims.aud = "billing-service".to_string();
        let token = sign_test_token(&claims);
        assert_eq!(
            verify_rs256(&token, &test_decoding_key(), &expectations()),
            Err(JwtValidationError::InvalidClaims)
        );
    }

    #[test]
    fn test_verify_rs256_rejects_future_iat() {
        let now = chrono::Utc::now().timestamp();
        let token = sign_test_token(&claims_at(now + 3600, now + 7200));

        assert_eq!(
            verify_rs256(&token, &test_decoding_key(), &expectations()),
            Err(JwtValidationError::InvalidClaims)
        );
    }

    #[test]
    fn test_verify_rs256_rejects_tampered_payload() {
        let token = sign_test_token(&valid_claims());
        let mut parts: Vec<String> = token.split('.').map(ToString::to_string).collect();

        let mut forged = valid_claims();
        forged.claims.sub = "admin".to_string();
        parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = parts.join(".");

        assert_eq!(
            verify_rs256(&tampered, &test_decoding_key(), &expectations()),
            Err(JwtValidationError::InvalidSignature)
        );
    }

    #[test]
    fn test_verify_rs256_rejects_symmetric_algorithm() {
        // HS256 token signed with a guessable secret must never be accepted.
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(TEST_KEY_ID.to_string());
        let token = encode(
            &header,
            &valid_claims(),
            &EncodingKey::from_secret(b"public-key-bytes"),
        )
        .unwrap();

        assert_eq!(
            verify_rs256(&token, &test_decoding_key(), &expectations()),
            Err(JwtValidationError::InvalidSignature)
        );
    }

    #[test]
    fn test_verify_rs256_rejects_none_algorithm() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT","kid":"k"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&valid_claims()).unwrap());
        let token = format!("{header}.{payload}.");

        assert!(verify_rs256(&token, &test_decoding_key(), &expectations()).is_err());
    }

    #[test]
    fn test_verify_rs256_rejects_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            verify_rs256(&oversized, &test_decoding_key(), &expectations()),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_error_messages_are_generic() {
        assert_eq!(
            JwtValidationError::UnknownKey.to_string(),
            JwtValidationError::InvalidSignature.to_string()
        );
        assert_eq!(JwtValidationError::ExpiredToken.error_type(), "expired_token");
    }
}
