//! Common utilities and types shared by the user and order services.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (validation, claims, constants)
pub mod jwt;

/// Module for the JSON Web Key data model and RSA key reconstruction
pub mod jwks;

/// Module for test key material shared across crates
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
