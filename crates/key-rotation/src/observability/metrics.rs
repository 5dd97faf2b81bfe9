//! Metrics definitions for the key rotation subsystem.
//!
//! All metrics follow Prometheus naming conventions:
//! - `kr_` prefix for the key rotation subsystem
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! The subsystem only emits through the `metrics` facade; the embedding
//! application owns the recorder/exporter.
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: 2 values (success, error)
//! - `error_category`: 4 values (not_found, expired, signature, internal)
//! - no key ids or token contents ever appear as labels

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ============================================================================
// Key Lifecycle Metrics
// ============================================================================

/// Record a key generation outcome
///
/// Metric: `kr_key_generation_total`
/// Labels: `status`
pub fn record_key_generation(status: &str) {
    counter!("kr_key_generation_total", "status" => status.to_string()).increment(1);
}

/// Record a key rotation outcome
///
/// Metric: `kr_key_rotation_total`
/// Labels: `status`
pub fn record_key_rotation(status: &str) {
    counter!("kr_key_rotation_total", "status" => status.to_string()).increment(1);
}

/// Record keys removed by the expiry sweep
///
/// Metric: `kr_keys_swept_total`
pub fn record_keys_swept(count: u64) {
    if count > 0 {
        counter!("kr_keys_swept_total").increment(count);
    }
}

/// Update the retained key count gauge
///
/// Metric: `kr_retained_keys`
pub fn set_retained_keys(count: u64) {
    gauge!("kr_retained_keys").set(count as f64);
}

/// Update the validation-eligible key count gauge (active plus retiring
/// keys inside their grace window; standby excluded)
///
/// Metric: `kr_eligible_signing_keys`
pub fn set_eligible_signing_keys(count: u64) {
    gauge!("kr_eligible_signing_keys").set(count as f64);
}

/// Update the active signing key age gauge
///
/// Metric: `kr_signing_key_age_seconds`
pub fn set_signing_key_age_seconds(age_seconds: f64) {
    gauge!("kr_signing_key_age_seconds").set(age_seconds);
}

/// Record the last successful rotation timestamp
///
/// Metric: `kr_key_rotation_last_success_timestamp`
pub fn set_key_rotation_last_success(timestamp_secs: f64) {
    gauge!("kr_key_rotation_last_success_timestamp").set(timestamp_secs);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `kr_token_issuance_duration_seconds`, `kr_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str, duration: Duration) {
    histogram!("kr_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("kr_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Record token validation result
///
/// Metric: `kr_token_validations_total`
/// Labels: `status`, `error_category`
pub fn record_token_validation(status: &str, error_category: Option<&str>) {
    let category = error_category.unwrap_or("none");
    counter!("kr_token_validations_total", "status" => status.to_string(), "error_category" => category.to_string())
        .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS export
///
/// Metric: `kr_jwks_exports_total`
/// Labels: `status`
pub fn record_jwks_export(status: &str) {
    counter!("kr_jwks_exports_total", "status" => status.to_string()).increment(1);
}
