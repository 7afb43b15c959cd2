//! Metrics definitions for the user service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `us_` prefix for User Service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `token_type`: 2 values (access, refresh)
//! - `status`: 2 values (success, error)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// # Errors
///
/// Returns error if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // RSA signing is the dominant cost of issuance
        .set_buckets_for_metric(
            Matcher::Prefix("us_token_issuance".to_string()),
            &[0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record token issuance duration and outcome
///
/// Metric: `us_token_issuance_duration_seconds`, `us_token_issuance_total`
/// Labels: `token_type`, `status`
pub fn record_token_issuance(token_type: &str, status: &str, duration: Duration) {
    histogram!("us_token_issuance_duration_seconds", "token_type" => token_type.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("us_token_issuance_total", "token_type" => token_type.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a JWKS document request
///
/// Metric: `us_jwks_requests_total`
pub fn record_jwks_request() {
    counter!("us_jwks_requests_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed in unit tests; these only check that
    // recording without one is a no-op rather than a panic.
    #[test]
    fn test_record_without_recorder() {
        record_token_issuance("access", "success", Duration::from_millis(3));
        record_token_issuance("refresh", "error", Duration::from_millis(1));
        record_jwks_request();
    }
}
