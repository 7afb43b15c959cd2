//! Observability for the order service.
//!
//! # Privacy by Default
//!
//! Instrumentation uses `#[instrument(skip_all)]`. Bearer tokens, claim
//! values and the Redis connection string never appear in spans, logs or
//! metric labels. `kid` values are public and may be logged.

pub mod metrics;

pub use metrics::init_metrics_recorder;
