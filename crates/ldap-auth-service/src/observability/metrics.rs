//! Metrics definitions for the LDAP auth service
//!
//! All metrics follow Prometheus naming conventions:
//! - `ldap_auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: valid, invalid, not_found, or an `AuthError::kind()` label
//! - `status`: success, error
//! - `algorithm`: HS256, HS384, HS512, ES256
//! - `response`: issued, fallback, unauthorised, bad_request, error

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with a scrape listener on `address`.
///
/// Must be called from within the tokio runtime, before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder is already installed or the buckets are rejected.
pub fn init_metrics_recorder(address: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        // Directory round trips: a healthy LDAP bind is a few milliseconds
        .set_buckets_for_metric(
            Matcher::Prefix("ldap_auth_verification".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 5.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set verification buckets: {e}"))?
        // Token signing is local CPU work
        .set_buckets_for_metric(
            Matcher::Prefix("ldap_auth_token_issuance".to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Verification Metrics
// ============================================================================

/// Record one completed verification request.
///
/// Metric: `ldap_auth_verification_duration_seconds`, `ldap_auth_verifications_total`
/// Labels: `outcome`
pub fn record_verification(outcome: &'static str, duration: Duration) {
    histogram!("ldap_auth_verification_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());

    counter!("ldap_auth_verifications_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Directory Metrics
// ============================================================================

/// Record a connection attempt.
///
/// Metric: `ldap_auth_directory_connects_total`
/// Labels: `status`
pub fn record_directory_connect(status: &'static str) {
    counter!("ldap_auth_directory_connects_total", "status" => status).increment(1);
}

/// Record a transparent retry after a network failure on a reused connection.
///
/// Metric: `ldap_auth_directory_retries_total`
pub fn record_directory_retry() {
    counter!("ldap_auth_directory_retries_total").increment(1);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `ldap_auth_token_issuance_duration_seconds`, `ldap_auth_token_issuance_total`
/// Labels: `algorithm`, `status`
pub fn record_token_issuance(algorithm: &'static str, status: &'static str, duration: Duration) {
    histogram!("ldap_auth_token_issuance_duration_seconds", "algorithm" => algorithm, "status" => status)
        .record(duration.as_secs_f64());

    counter!("ldap_auth_token_issuance_total", "algorithm" => algorithm, "status" => status)
        .increment(1);
}

// ============================================================================
// Gateway Metrics
// ============================================================================

/// Record the response class returned to the conferencing server.
///
/// Metric: `ldap_auth_gateway_responses_total`
/// Labels: `response`
pub fn record_gateway_response(response: &'static str) {
    counter!("ldap_auth_gateway_responses_total", "response" => response).increment(1);
}
