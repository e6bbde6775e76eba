//! Scheduler status endpoint.

use crate::models::ScheduleStatus;
use crate::routes::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use common::jwt::Claims;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/schedule/status
///
/// Requires authentication. Returns the outcome of the latest tick.
///
/// ## Example Response
///
/// ```json
/// {
///   "state": "succeeded",
///   "ticks": 12,
///   "last_finished_at": "2026-01-01T00:03:00Z",
///   "last_status": "200 OK"
/// }
/// ```
#[instrument(skip_all, name = "sidecar.schedule.status")]
pub async fn schedule_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Json<ScheduleStatus> {
    tracing::debug!(
        target: "sidecar.handlers.schedule",
        sub = claims.sub.as_deref().unwrap_or("-"),
        "Schedule status requested"
    );

    Json(state.schedule_status.borrow().clone())
}
