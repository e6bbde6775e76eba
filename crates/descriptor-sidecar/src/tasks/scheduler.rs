//! Periodic deployment scheduler.
//!
//! Every period the scheduler obtains a bearer token, triggers an execution
//! on the deployment manager and then a resource sync. Ticks never overlap
//! and missed ticks are skipped rather than replayed.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. A tick
//! already in progress completes before the loop observes cancellation.

use crate::models::ScheduleStatus;
use crate::observability::metrics::{
    record_schedule_tick, record_token_fetch, record_token_issuance, record_token_issuance_failure,
};
use crate::services::deploy_manager::{DeploymentManager, DownstreamError, Exchange};
use chrono::Utc;
use common::credential::TokenError;
use common::token_manager::{TokenFetchCallback, TokenFetchEvent, TokenFetcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Default period between ticks.
pub const DEFAULT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(15);

/// Result of a successful tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Status line of the execute call, e.g. "200 OK".
    pub status: String,
    pub execution: Exchange,
    pub sync: Exchange,
}

/// Why a tick did not complete.
#[derive(Debug, Clone, Error)]
pub enum TickError {
    #[error("Token issuance failed: {0}")]
    Issuance(#[from] TokenError),

    #[error(transparent)]
    Downstream(#[from] DownstreamError),
}

/// Callback wiring token fetch events to metrics.
#[must_use]
pub fn token_metrics_callback() -> TokenFetchCallback {
    Arc::new(|event: TokenFetchEvent| {
        record_token_fetch(event.source());
        match event {
            TokenFetchEvent::Issued { duration } => record_token_issuance(duration),
            TokenFetchEvent::Failed { error_kind } => record_token_issuance_failure(error_kind),
            TokenFetchEvent::CacheHit => {}
        }
    })
}

/// Run one tick: fetch a token, trigger execution, then trigger sync.
///
/// Sync is only attempted once execution returned a response. A sync
/// transport failure fails the whole tick even though execution went
/// through. Non-2xx statuses are not failures.
///
/// # Errors
///
/// - `TickError::Issuance` - no token; neither endpoint was called
/// - `TickError::Downstream` - an endpoint could not be reached
#[instrument(skip_all, name = "sidecar.task.scheduler.tick")]
pub async fn run_tick(
    fetcher: &TokenFetcher,
    deploy_manager: &dyn DeploymentManager,
) -> Result<TickReport, TickError> {
    let credential = fetcher.fetch_token().await?;

    let execution = deploy_manager
        .trigger_execution(&credential.access_token)
        .await?;
    let sync = deploy_manager.trigger_sync(&credential.access_token).await?;

    Ok(TickReport {
        status: execution.status.clone(),
        execution,
        sync,
    })
}

/// Run the scheduler loop until `cancel_token` fires.
///
/// The first tick happens one `period` after start. Each outcome is logged,
/// recorded in metrics and published on `status_tx`.
///
/// # Arguments
///
/// * `fetcher` - Token fetcher for the sidecar's client identity
/// * `deploy_manager` - Deployment manager client
/// * `period` - Time between ticks; zero is rejected
/// * `status_tx` - Receives a new `ScheduleStatus` after every tick
/// * `cancel_token` - Token for graceful shutdown
pub async fn start_scheduler(
    fetcher: TokenFetcher,
    deploy_manager: Arc<dyn DeploymentManager>,
    period: Duration,
    status_tx: watch::Sender<ScheduleStatus>,
    cancel_token: CancellationToken,
) {
    if period.is_zero() {
        error!(target: "sidecar.task.scheduler", "Schedule period must be greater than zero, scheduler not started");
        return;
    }

    info!(
        target: "sidecar.task.scheduler",
        period_seconds = period.as_secs_f64(),
        identity = %fetcher.identity(),
        "Scheduler started"
    );

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let start = Instant::now();
                let outcome = run_tick(&fetcher, deploy_manager.as_ref()).await;
                let duration = start.elapsed();

                match outcome {
                    Ok(report) => {
                        info!(
                            target: "sidecar.task.scheduler",
                            status = %report.status,
                            sync_status = %report.sync.status,
                            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                            "Scheduled tick completed"
                        );
                        record_schedule_tick("success", duration);
                        status_tx.send_modify(|status| {
                            *status = status.succeeded(report.status, Utc::now());
                        });
                    }
                    Err(e) => {
                        error!(
                            target: "sidecar.task.scheduler",
                            error = %e,
                            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                            "Scheduled tick failed"
                        );
                        record_schedule_tick("failure", duration);
                        status_tx.send_modify(|status| {
                            *status = status.failed(e.to_string(), Utc::now());
                        });
                    }
                }
            }
            () = cancel_token.cancelled() => {
                info!(target: "sidecar.task.scheduler", "Scheduler received shutdown signal, exiting");
                break;
            }
        }
    }
}
