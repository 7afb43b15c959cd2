//! Observability for the user service.
//!
//! Handlers and services use `#[instrument(skip_all)]`; tokens, key
//! material and user identifiers never appear in span fields.

pub mod metrics;

pub use metrics::{init_metrics_recorder, record_jwks_request, record_token_issuance};
