//! Metrics definitions for the descriptor sidecar.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sidecar_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the sidecar's own routes, everything else is `/other`
//! - `status`: success, error, timeout (HTTP); success, failure (ticks)
//! - `source`: cache, issuer, error
//! - `error` (token issuance): transport, rejected, decode, configuration
//! - `outcome`: success plus one value per `BearerError` kind
//! - `endpoint` (deployment manager): execute, sync

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to serve
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("sidecar_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // A tick covers token issuance plus two downstream calls
        .set_buckets_for_metric(
            Matcher::Prefix("sidecar_schedule_tick".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set schedule tick buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("sidecar_token_issuance_duration_seconds".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `sidecar_http_requests_total`, `sidecar_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("sidecar_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("sidecar_http_requests_total",
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

/// Unknown paths collapse to `/other` to bound cardinality.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/schedule/status" => "/api/v1/schedule/status",
        _ => "/other",
    }
}

// ============================================================================
// Scheduler Metrics
// ============================================================================

/// Record one scheduler tick
///
/// Metric: `sidecar_schedule_ticks_total`, `sidecar_schedule_tick_duration_seconds`
/// Labels: `status` (success, failure)
pub fn record_schedule_tick(status: &'static str, duration: Duration) {
    histogram!("sidecar_schedule_tick_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    counter!("sidecar_schedule_ticks_total", "status" => status).increment(1);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record where a token fetch was served from
///
/// Metric: `sidecar_token_fetch_total`
/// Labels: `source` (cache, issuer, error)
pub fn record_token_fetch(source: &'static str) {
    counter!("sidecar_token_fetch_total", "source" => source).increment(1);
}

/// Record a successful token issuance, retries included
///
/// Metric: `sidecar_token_issuance_duration_seconds`
pub fn record_token_issuance(duration: Duration) {
    histogram!("sidecar_token_issuance_duration_seconds").record(duration.as_secs_f64());
}

/// Record a failed token issuance
///
/// Metric: `sidecar_token_issuance_failures_total`
/// Labels: `error`
pub fn record_token_issuance_failure(error_kind: &'static str) {
    counter!("sidecar_token_issuance_failures_total", "error" => error_kind).increment(1);
}

/// Record an inbound bearer token validation
///
/// Metric: `sidecar_bearer_validations_total`
/// Labels: `outcome`
pub fn record_bearer_validation(outcome: &'static str) {
    counter!("sidecar_bearer_validations_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Deployment Manager Metrics
// ============================================================================

/// Record a call to the deployment manager
///
/// Metric: `sidecar_deploy_manager_calls_total`
/// Labels: `endpoint` (execute, sync), `status` (HTTP status code or "error")
pub fn record_deploy_manager_call(endpoint: &'static str, status: &str) {
    counter!("sidecar_deploy_manager_calls_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    /// Run `f` against a thread-local recorder and return
    /// `(metric name, labels, value)` for everything it recorded.
    fn capture(f: impl FnOnce()) -> Vec<(String, Vec<(String, String)>, DebugValue)> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, f);

        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, value)| {
                let key = key.key();
                let labels = key
                    .labels()
                    .map(|l| (l.key().to_string(), l.value().to_string()))
                    .collect();
                (key.name().to_string(), labels, value)
            })
            .collect()
    }

    fn has_label(labels: &[(String, String)], key: &str, value: &str) -> bool {
        labels.iter().any(|(k, v)| k == key && v == value)
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(500), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(
            normalize_endpoint("/api/v1/schedule/status"),
            "/api/v1/schedule/status"
        );
        assert_eq!(normalize_endpoint("/api/v1/anything/else"), "/other");
        assert_eq!(normalize_endpoint("/"), "/other");
    }

    #[test]
    fn test_record_http_request_emits_counter_and_histogram() {
        let metrics = capture(|| {
            record_http_request("GET", "/health", 200, Duration::from_millis(3));
            record_http_request("GET", "/nope/123", 404, Duration::from_millis(1));
        });

        let counters: Vec<_> = metrics
            .iter()
            .filter(|(name, _, _)| name == "sidecar_http_requests_total")
            .collect();
        assert_eq!(counters.len(), 2);
        assert!(counters
            .iter()
            .any(|(_, labels, _)| has_label(labels, "endpoint", "/other")
                && has_label(labels, "status_code", "404")));

        assert!(metrics
            .iter()
            .any(|(name, labels, _)| name == "sidecar_http_request_duration_seconds"
                && has_label(labels, "status", "success")));
    }

    #[test]
    fn test_record_schedule_tick() {
        let metrics = capture(|| {
            record_schedule_tick("success", Duration::from_millis(40));
            record_schedule_tick("success", Duration::from_millis(60));
            record_schedule_tick("failure", Duration::from_millis(5));
        });

        let success = metrics
            .iter()
            .find(|(name, labels, _)| {
                name == "sidecar_schedule_ticks_total" && has_label(labels, "status", "success")
            })
            .expect("success counter recorded");
        assert!(matches!(success.2, DebugValue::Counter(2)));

        assert!(metrics
            .iter()
            .any(|(name, labels, _)| name == "sidecar_schedule_tick_duration_seconds"
                && has_label(labels, "status", "failure")));
    }

    #[test]
    fn test_record_token_fetch_and_bearer_validation() {
        let metrics = capture(|| {
            record_token_fetch("cache");
            record_token_fetch("issuer");
            record_bearer_validation("success");
            record_bearer_validation("invalid_token");
        });

        assert!(metrics
            .iter()
            .any(|(name, labels, _)| name == "sidecar_token_fetch_total"
                && has_label(labels, "source", "cache")));
        assert!(metrics
            .iter()
            .any(|(name, labels, _)| name == "sidecar_token_fetch_total"
                && has_label(labels, "source", "issuer")));
        assert!(metrics
            .iter()
            .any(|(name, labels, _)| name == "sidecar_bearer_validations_total"
                && has_label(labels, "outcome", "invalid_token")));
    }

    #[test]
    fn test_record_token_issuance() {
        let metrics = capture(|| {
            record_token_issuance(Duration::from_millis(80));
            record_token_issuance_failure("transport");
            record_token_issuance_failure("transport");
        });

        assert!(metrics
            .iter()
            .any(|(name, _, value)| name == "sidecar_token_issuance_duration_seconds"
                && matches!(value, DebugValue::Histogram(v) if v.len() == 1)));
        assert!(metrics.iter().any(|(name, labels, value)| name
            == "sidecar_token_issuance_failures_total"
            && has_label(labels, "error", "transport")
            && matches!(value, DebugValue::Counter(2))));
    }

    #[test]
    fn test_record_deploy_manager_call() {
        let metrics = capture(|| {
            record_deploy_manager_call("execute", "200");
            record_deploy_manager_call("sync", "error");
        });

        assert!(metrics.iter().any(|(name, labels, _)| name
            == "sidecar_deploy_manager_calls_total"
            && has_label(labels, "endpoint", "execute")
            && has_label(labels, "status", "200")));
        assert!(metrics.iter().any(|(name, labels, _)| name
            == "sidecar_deploy_manager_calls_total"
            && has_label(labels, "endpoint", "sync")
            && has_label(labels, "status", "error")));
    }
}
