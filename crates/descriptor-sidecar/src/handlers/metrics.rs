//! `GET /metrics`: Prometheus scrape of the sidecar's own counters.
//!
//! Exposes scheduler ticks, token cache hits and issuance latency,
//! deployment-manager call outcomes, bearer validation outcomes and inbound
//! HTTP traffic. Left unauthenticated for the scraper; no label carries a
//! token or client identity.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Render every `sidecar_*` series, e.g.
///
/// ```text
/// # TYPE sidecar_schedule_ticks_total counter
/// sidecar_schedule_ticks_total{status="success"} 42
/// # TYPE sidecar_token_fetch_total counter
/// sidecar_token_fetch_total{source="cache"} 41
/// sidecar_token_fetch_total{source="issuer"} 1
/// ```
#[tracing::instrument(skip_all, name = "sidecar.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
