//! Shared RSA test key material.
//!
//! Generating a 2048-bit RSA key takes noticeable time, so each test binary
//! generates at most two keys and reuses them. `primary` signs the tokens
//! a test expects to verify; `secondary` stands in for a key the verifier
//! has never seen.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use crate::jwks::Jwk;
use crate::jwt::TokenClaims;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::OnceLock;

/// Key ID used for the primary test key.
pub const TEST_KEY_ID: &str = "test-key-01";

/// Key ID used for the secondary test key.
pub const OTHER_KEY_ID: &str = "test-key-02";

/// A generated keypair with its PKCS#8 PEM encoding.
pub struct TestKeypair {
    pub private_key: RsaPrivateKey,
    pub public_key: RsaPublicKey,
    pub private_key_pem: String,
    encoding_key: EncodingKey,
}

impl TestKeypair {
    fn generate() -> Self {
        let private_key =
            RsaPrivateKey::new(&mut OsRng, 2048).expect("Failed to generate test RSA key");
        let public_key = private_key.to_public_key();
        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode test RSA key")
            .to_string();
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .expect("Failed to build test encoding key");

        Self {
            private_key,
            public_key,
            private_key_pem,
            encoding_key,
        }
    }

    /// Published form of this key under `kid`.
    #[must_use]
    pub fn jwk(&self, kid: &str) -> Jwk {
        Jwk::from_rsa_public_key(kid, &self.public_key)
    }

    /// Signs `claims` with RS256, tagging the header with `kid`.
    #[must_use]
    pub fn sign(&self, kid: &str, claims: &TokenClaims) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(kid.to_string());

        encode(&header, claims, &self.encoding_key).expect("Failed to sign test token")
    }
}

static PRIMARY: OnceLock<TestKeypair> = OnceLock::new();
static SECONDARY: OnceLock<TestKeypair> = OnceLock::new();

/// The primary test keypair, generated on first use.
pub fn primary() -> &'static TestKeypair {
    PRIMARY.get_or_init(TestKeypair::generate)
}

/// A second, unrelated keypair.
pub fn secondary() -> &'static TestKeypair {
    SECONDARY.get_or_init(TestKeypair::generate)
}

#[must_use]
pub fn test_public_key() -> &'static RsaPublicKey {
    &primary().public_key
}

#[must_use]
pub fn test_jwk(kid: &str) -> Jwk {
    primary().jwk(kid)
}

#[must_use]
pub fn test_decoding_key() -> DecodingKey {
    test_jwk(TEST_KEY_ID)
        .to_decoding_key()
        .expect("Test JWK should produce a decoding key")
}

/// Signs `claims` with the primary key under [`TEST_KEY_ID`].
#[must_use]
pub fn sign_test_token(claims: &TokenClaims) -> String {
    primary().sign(TEST_KEY_ID, claims)
}
