//! Signing key material for the token authority.
//!
//! The service holds exactly one RSA-2048 keypair. It is loaded from a
//! PKCS#8 PEM file on startup; when the file does not exist a fresh key is
//! generated and persisted so that restarts keep the same key ID.
//!
//! The key ID is derived from the public modulus (first 16 hex characters of
//! its SHA-256 digest), so it is stable for a given key and changes whenever
//! the key changes.

use crate::errors::UserServiceError;
use common::jwks::{Jwk, JwkSet};
use common::jwt::TokenClaims;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// RSA modulus size for generated keys.
pub const SIGNING_KEY_BITS: usize = 2048;

/// Length of the derived key ID in hex characters.
const KEY_ID_HEX_LEN: usize = 16;

/// The authority's signing keypair plus derived verification material.
pub struct SigningKeyMaterial {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key: RsaPublicKey,
    key_id: String,
    key_path: PathBuf,
}

impl fmt::Debug for SigningKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyMaterial")
            .field("key_id", &self.key_id)
            .field("key_path", &self.key_path)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl SigningKeyMaterial {
    /// Load the key at `path`, generating and persisting one if absent.
    ///
    /// This performs blocking file I/O and (on first start) RSA key
    /// generation; call it from `spawn_blocking` inside a runtime.
    ///
    /// # Errors
    ///
    /// - `KeyStorage` - the file exists but cannot be read, or a new key
    ///   cannot be written
    /// - `Crypto` - the file is not a valid PKCS#8 RSA private key, or key
    ///   generation fails
    #[instrument(skip_all, name = "us.crypto.load_key")]
    pub fn load_or_generate(path: &Path) -> Result<Self, UserServiceError> {
        match fs::read_to_string(path) {
            Ok(pem) => {
                let private_key = RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| {
                    UserServiceError::Crypto(format!("Failed to parse signing key: {}", e))
                })?;
                let material = Self::from_private_key(&private_key, path)?;
                tracing::info!(
                    target: "us.crypto",
                    key_id = %material.key_id,
                    "Loaded signing key"
                );
                Ok(material)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    target: "us.crypto",
                    path = %path.display(),
                    "Signing key not found, generating a new one"
                );
                let private_key = RsaPrivateKey::new(&mut OsRng, SIGNING_KEY_BITS).map_err(|e| {
                    UserServiceError::Crypto(format!("Key generation failed: {}", e))
                })?;
                persist_private_key(&private_key, path)?;
                let material = Self::from_private_key(&private_key, path)?;
                tracing::info!(
                    target: "us.crypto",
                    key_id = %material.key_id,
                    "Generated and persisted signing key"
                );
                Ok(material)
            }
            Err(e) => Err(UserServiceError::KeyStorage(format!(
                "Failed to read signing key: {}",
                e
            ))),
        }
    }

    fn from_private_key(private_key: &RsaPrivateKey, path: &Path) -> Result<Self, UserServiceError> {
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| UserServiceError::Crypto(format!("Failed to encode signing key: {}", e)))?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| UserServiceError::Crypto(format!("Invalid signing key: {}", e)))?;

        let public_key = private_key.to_public_key();
        let key_id = derive_key_id(&public_key)?;
        let decoding_key = Jwk::from_rsa_public_key(&key_id, &public_key)
            .to_decoding_key()
            .map_err(|e| UserServiceError::Crypto(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            public_key,
            key_id,
            key_path: path.to_path_buf(),
        })
    }

    /// Key ID published in the JWKS and stamped into every token header.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Location the key was loaded from or written to.
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Verification key for tokens signed by this keypair.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// The public JWKS document: a single RSA signing key.
    pub fn publish_jwks(&self) -> JwkSet {
        JwkSet {
            keys: vec![Jwk::from_rsa_public_key(&self.key_id, &self.public_key)],
        }
    }

    /// Sign `claims` as an RS256 JWT with this key's `kid` in the header.
    ///
    /// # Errors
    ///
    /// Returns `Crypto` if encoding fails.
    pub fn sign_claims(&self, claims: &TokenClaims) -> Result<String, UserServiceError> {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.key_id.clone());

        encode(&header, claims, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "us.crypto", error = %e, "Token signing failed");
            UserServiceError::Crypto(format!("Token signing failed: {}", e))
        })
    }
}

/// First 16 hex characters of SHA-256 over the big-endian modulus.
fn derive_key_id(public_key: &RsaPublicKey) -> Result<String, UserServiceError> {
    let digest = Sha256::digest(public_key.n().to_bytes_be());
    let encoded = hex::encode(digest);
    encoded
        .get(..KEY_ID_HEX_LEN)
        .map(str::to_string)
        .ok_or(UserServiceError::Internal)
}

/// Write the key as PKCS#8 PEM, owner-readable only, via a temp file rename.
fn persist_private_key(private_key: &RsaPrivateKey, path: &Path) -> Result<(), UserServiceError> {
    let pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| UserServiceError::Crypto(format!("Failed to encode signing key: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_path = path.as_os_str().to_os_string();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp_path)?;
    file.write_all(pem.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}
