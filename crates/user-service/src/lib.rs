//! User Service Library
//!
//! The user service is the token authority: it owns the RSA signing key,
//! mints access and refresh tokens, and publishes the public half of its
//! key as a JWKS document for resource servers.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `crypto` - Signing key material (load, generate, persist, sign)
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `observability` - Metrics
//! - `routes` - Axum router setup
//! - `services` - Token issuing

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod services;
