//! Background tasks for the order service.
//!
//! # Tasks
//!
//! - `jwks_refresher` - Periodically refreshes the JWKS key cache

pub mod jwks_refresher;

pub use jwks_refresher::BackgroundRefresher;
