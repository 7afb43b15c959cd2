//! Metrics definitions for the order service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `os_` prefix for Order Service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP verbs
//! - `endpoint`: known static paths, everything else is `/other`
//! - `outcome`: refreshed, joined, failed
//! - `backend`: in_memory, distributed
//! - `result`: hit, miss
//! - `error_type`: bounded by `JwtValidationError` variants

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// # Errors
///
/// Returns error if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("os_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetch is bounded by the fetch timeout (default 10s)
        .set_buckets_for_metric(
            Matcher::Prefix("os_jwks_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `os_http_requests_total`, `os_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("os_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("os_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        _ => "/other",
    }
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS refresh attempt
///
/// Metric: `os_jwks_refresh_total`, `os_jwks_refresh_duration_seconds`
/// Labels: `outcome`
pub fn record_jwks_refresh(outcome: &'static str, duration: Duration) {
    histogram!("os_jwks_refresh_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
    counter!("os_jwks_refresh_total", "outcome" => outcome).increment(1);
}

/// Number of keys stored by the most recent successful refresh
///
/// Metric: `os_jwks_keys_cached`
pub fn set_jwks_keys_cached(count: usize) {
    gauge!("os_jwks_keys_cached").set(count as f64);
}

/// Record a key cache lookup
///
/// Metric: `os_jwks_cache_lookups_total`
/// Labels: `backend`, `result`
pub fn record_key_cache_lookup(backend: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("os_jwks_cache_lookups_total", "backend" => backend, "result" => result)
        .increment(1);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record a token validation result
///
/// Metric: `os_token_validations_total`
/// Labels: `status`, `error_type`
pub fn record_token_validation(status: &'static str, error_type: Option<&'static str>) {
    counter!("os_token_validations_total",
        "status" => status,
        "error_type" => error_type.unwrap_or("none")
    )
    .increment(1);
}
