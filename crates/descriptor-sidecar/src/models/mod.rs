//! Descriptor sidecar models.
//!
//! Response bodies served by the sidecar's HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status.
    pub status: String,
}

impl HealthResponse {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Outcome of the most recent scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleState {
    /// No tick has completed yet.
    Pending,

    /// The last tick reached both deployment-manager endpoints.
    Succeeded,

    /// The last tick failed during issuance or transport.
    Failed,
}

/// Scheduler progress, published after every tick.
///
/// Returned by `/api/v1/schedule/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStatus {
    pub state: ScheduleState,

    /// Ticks completed since startup, successful or not.
    pub ticks: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_finished_at: Option<DateTime<Utc>>,

    /// Status line of the last execute call (e.g., "200 OK").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ScheduleStatus {
    /// Status before the first tick.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            state: ScheduleState::Pending,
            ticks: 0,
            last_finished_at: None,
            last_status: None,
            last_error: None,
        }
    }

    /// Next status after a successful tick.
    #[must_use]
    pub fn succeeded(&self, status: String, at: DateTime<Utc>) -> Self {
        Self {
            state: ScheduleState::Succeeded,
            ticks: self.ticks.saturating_add(1),
            last_finished_at: Some(at),
            last_status: Some(status),
            last_error: None,
        }
    }

    /// Next status after a failed tick. `last_status` keeps the previous
    /// successful status line.
    #[must_use]
    pub fn failed(&self, error: String, at: DateTime<Utc>) -> Self {
        Self {
            state: ScheduleState::Failed,
            ticks: self.ticks.saturating_add(1),
            last_finished_at: Some(at),
            last_status: self.last_status.clone(),
            last_error: Some(error),
        }
    }
}

impl Default for ScheduleStatus {
    fn default() -> Self {
        Self::pending()
    }
}
