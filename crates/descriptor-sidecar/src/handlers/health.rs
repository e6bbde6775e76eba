//! Liveness endpoint.

use crate::models::HealthResponse;
use axum::Json;
use tracing::instrument;

/// Handler for GET /health
///
/// Always healthy once the listener is up; the scheduler's progress is
/// reported separately at `/api/v1/schedule/status`.
#[instrument(skip_all, name = "sidecar.health.check")]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
