//! Liveness check.

use tracing::instrument;

/// Handler for GET /health
///
/// The signing key is loaded before the listener binds, so a running
/// process can always sign and publish.
#[instrument(skip_all, name = "us.health.check")]
pub async fn health_check() -> &'static str {
    "OK"
}
