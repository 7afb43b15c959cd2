//! Authentication module for the order service.
//!
//! Validates bearer tokens minted by the user service using the RSA keys it
//! publishes at `/.well-known/jwks.json`.
//!
//! # Components
//!
//! - `key_cache` - `JwksKeyCache` trait and backend selection
//! - `memory_cache` / `redis_cache` - cache backends
//! - `jwks` - refresh coordination (cache-aside, single-flight)
//! - `jwt` - token verification using resolved keys

pub mod jwks;
pub mod jwt;
pub mod key_cache;
pub mod memory_cache;
pub mod redis_cache;

pub use jwks::{CoordinatorError, KeyRefreshCoordinator, RefreshOutcome, RefreshSettings};
pub use jwt::TokenVerifier;
pub use key_cache::{build_key_cache, CachedKeyEntry, JwksKeyCache, KeyCacheError};
pub use memory_cache::InMemoryJwksKeyCache;
pub use redis_cache::RedisJwksKeyCache;
