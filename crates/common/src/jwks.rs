//! JSON Web Key (JWK) data model and RSA key reconstruction.
//!
//! The authority publishes its RSA public key as a [`JwkSet`]; resource
//! servers fetch that document and rebuild a [`DecodingKey`] from each
//! key's base64url `n`/`e` parameters.
//!
//! Fields are lenient on deserialization: a set that contains an EC or
//! otherwise foreign key still parses, and callers skip keys for which
//! [`Jwk::is_rsa_signing_key`] is false.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest RSA modulus accepted for signature verification.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Largest RSA modulus accepted. Bounds verification cost for foreign keys.
pub const MAX_RSA_MODULUS_BITS: usize = 16384;

/// Errors reconstructing a public key from a JWK.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwkError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("invalid base64url encoding in '{0}'")]
    InvalidEncoding(&'static str),

    #[error("invalid RSA public key: {0}")]
    InvalidRsaKey(String),

    #[error("RSA modulus too small: {0} bits")]
    KeyTooSmall(usize),
}

/// A single JSON Web Key as published in `/.well-known/jwks.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA").
    pub kty: String,

    /// Key use ("sig").
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Key ID, matched against the token header `kid`.
    #[serde(default)]
    pub kid: String,

    /// Modulus, base64url big-endian.
    #[serde(default)]
    pub n: String,

    /// Public exponent, base64url big-endian.
    #[serde(default)]
    pub e: String,

    /// Algorithm ("RS256").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl Jwk {
    /// Builds the published form of an RSA signing key.
    #[must_use]
    pub fn from_rsa_public_key(kid: &str, key: &RsaPublicKey) -> Self {
        Self {
            kty: "RSA".to_string(),
            key_use: Some("sig".to_string()),
            kid: kid.to_string(),
            n: URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
            alg: Some("RS256".to_string()),
        }
    }

    /// Whether this key can verify RS256 tokens.
    ///
    /// Requires `kty == "RSA"`, a non-empty `kid`, and when present
    /// `use == "sig"` and `alg == "RS256"`.
    #[must_use]
    pub fn is_rsa_signing_key(&self) -> bool {
        self.kty == "RSA"
            && !self.kid.is_empty()
            && self.key_use.as_deref().map_or(true, |u| u == "sig")
            && self.alg.as_deref().map_or(true, |a| a == "RS256")
    }

    /// Reconstructs the verification key from `n`/`e`.
    ///
    /// # Errors
    ///
    /// See [`decoding_key_from_jwk`].
    pub fn to_decoding_key(&self) -> Result<DecodingKey, JwkError> {
        decoding_key_from_jwk(self)
    }
}

/// A JSON Web Key Set (RFC 7517).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published keys.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Looks up a key by `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

/// Rebuild an RSA verification key from a JWK's `n`/`e` parameters.
///
/// Both parameters are decoded (tolerating trailing `=` padding) and checked
/// as a well-formed RSA public key of [`MIN_RSA_MODULUS_BITS`] to
/// [`MAX_RSA_MODULUS_BITS`] before
/// a [`DecodingKey`] is produced. A key that fails any of these checks must
/// never be used for verification.
///
/// # Errors
///
/// - `UnsupportedKeyType` - `kty` is not "RSA"
/// - `InvalidEncoding` - `n` or `e` is empty or not base64url
/// - `InvalidRsaKey` - components do not form a valid public key
/// - `KeyTooSmall` - modulus below the minimum size
pub fn decoding_key_from_jwk(jwk: &Jwk) -> Result<DecodingKey, JwkError> {
    if jwk.kty != "RSA" {
        return Err(JwkError::UnsupportedKeyType(jwk.kty.clone()));
    }

    let n_b64 = jwk.n.trim_end_matches('=');
    let e_b64 = jwk.e.trim_end_matches('=');

    let n = decode_component(n_b64, "n")?;
    let e = decode_component(e_b64, "e")?;

    let public_key = RsaPublicKey::new_with_max_size(
        BigUint::from_bytes_be(&n),
        BigUint::from_bytes_be(&e),
        MAX_RSA_MODULUS_BITS,
    )
    .map_err(|err| JwkError::InvalidRsaKey(err.to_string()))?;

    let bits = public_key.n().bits();
    if bits < MIN_RSA_MODULUS_BITS {
        return Err(JwkError::KeyTooSmall(bits));
    }

    DecodingKey::from_rsa_components(n_b64, e_b64)
        .map_err(|err| JwkError::InvalidRsaKey(err.to_string()))
}

fn decode_component(value: &str, field: &'static str) -> Result<Vec<u8>, JwkError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| JwkError::InvalidEncoding(field))?;
    if bytes.is_empty() {
        return Err(JwkError::InvalidEncoding(field));
    }
    Ok(bytes)
}
