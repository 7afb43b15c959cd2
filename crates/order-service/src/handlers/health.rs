//! Liveness check.

use tracing::instrument;

/// Handler for GET /health
///
/// Does not touch the key cache or the authority; a JWKS outage surfaces as
/// 503 on protected routes instead.
#[instrument(skip_all, name = "os.health.check")]
pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }
}
