//! Order Service Library
//!
//! Resource server that accepts bearer tokens minted by the user service.
//! Signing keys are fetched from the authority's JWKS document and cached
//! per `kid`, either in-process or in Redis.
//!
//! # Modules
//!
//! - `auth` - Key cache, refresh coordination and token verification
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer authentication and HTTP metrics
//! - `observability` - Metrics
//! - `routes` - Axum router setup
//! - `tasks` - Background JWKS refresh

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod tasks;
