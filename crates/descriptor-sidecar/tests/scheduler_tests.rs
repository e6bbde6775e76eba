//! Scheduler integration tests.
//!
//! Runs the real scheduler, token issuer and deployment manager client
//! against `wiremock` servers, with a one second period.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use descriptor_sidecar::models::ScheduleState;
use sidecar_test_utils::*;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_ticks_call_execute_then_sync_with_cached_token() -> Result<()> {
    let idp = MockIdentityProvider::start().await;
    idp.issue_token("tok-1", 300, 1).await;

    let dm = MockDeployManager::start().await;
    dm.execute_responds(200).await;
    dm.sync_responds(200).await;

    let mut server = TestSidecarServer::spawn_with_scheduler(&idp.uri(), &dm.uri(), 1).await?;

    let status = server.wait_for_ticks(2, WAIT).await?;
    server.stop_scheduler().await?;

    assert_eq!(status.state, ScheduleState::Succeeded);
    assert_eq!(status.last_status.as_deref(), Some("200 OK"));

    // One issuance serves every tick
    assert_eq!(idp.token_requests().await, 1);
    assert!(dm.execute_requests().await >= 2);
    assert_eq!(dm.execute_requests().await, dm.sync_requests().await);

    let headers = dm.authorization_headers().await;
    assert!(!headers.is_empty());
    assert!(headers.iter().all(|h| h == "Bearer tok-1"));

    Ok(())
}

/// The tick reports the execute status line even when it is an error status.
#[tokio::test]
async fn test_non_success_execute_status_is_reported_not_failed() -> Result<()> {
    let idp = MockIdentityProvider::start().await;
    idp.issue_token("tok-1", 300, 1).await;

    let dm = MockDeployManager::start().await;
    dm.execute_responds(503).await;
    dm.sync_responds(200).await;

    let mut server = TestSidecarServer::spawn_with_scheduler(&idp.uri(), &dm.uri(), 1).await?;

    let status = server.wait_for_ticks(1, WAIT).await?;
    server.stop_scheduler().await?;

    assert_eq!(status.state, ScheduleState::Succeeded);
    assert_eq!(status.last_status.as_deref(), Some("503 Service Unavailable"));
    assert!(dm.sync_requests().await >= 1);

    Ok(())
}

/// A rejected token request fails the tick before any downstream call.
#[tokio::test]
async fn test_issuer_rejection_skips_deployment_manager() -> Result<()> {
    let idp = MockIdentityProvider::start().await;
    idp.reject(401).await;

    let dm = MockDeployManager::start().await;
    dm.execute_responds(200).await;
    dm.sync_responds(200).await;

    let mut server = TestSidecarServer::spawn_with_scheduler(&idp.uri(), &dm.uri(), 1).await?;

    let status = server.wait_for_ticks(1, WAIT).await?;
    server.stop_scheduler().await?;

    assert_eq!(status.state, ScheduleState::Failed);
    assert!(status.last_error.unwrap().contains("rejected"));
    assert_eq!(dm.execute_requests().await, 0);
    assert_eq!(dm.sync_requests().await, 0);

    Ok(())
}

/// An unreachable deployment manager fails the tick at the execute step.
#[tokio::test]
async fn test_unreachable_deployment_manager_fails_tick() -> Result<()> {
    let idp = MockIdentityProvider::start().await;
    idp.issue_token("tok-1", 300, 1).await;

    let mut server =
        TestSidecarServer::spawn_with_scheduler(&idp.uri(), "http://127.0.0.1:1", 1).await?;

    let status = server.wait_for_ticks(1, WAIT).await?;
    server.stop_scheduler().await?;

    assert_eq!(status.state, ScheduleState::Failed);
    let error = status.last_error.unwrap();
    assert!(error.contains("execute"), "unexpected error: {error}");

    Ok(())
}

/// Status is visible over HTTP to an authenticated caller.
#[tokio::test]
async fn test_status_endpoint_tracks_scheduler() -> Result<()> {
    let idp = MockIdentityProvider::start().await;
    idp.issue_token("tok-1", 300, 1).await;

    let dm = MockDeployManager::start().await;
    dm.execute_responds(202).await;
    dm.sync_responds(200).await;

    let mut server = TestSidecarServer::spawn_with_scheduler(&idp.uri(), &dm.uri(), 1).await?;
    server.wait_for_ticks(1, WAIT).await?;
    server.stop_scheduler().await?;

    let token = TestTokenBuilder::new().sign_rs256();
    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/schedule/status", server.url()))
        .header("Authorization", bearer(&token))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["state"], "succeeded");
    assert_eq!(body["last_status"], "202 Accepted");
    assert!(body["ticks"].as_u64().unwrap() >= 1);
    assert!(body["last_finished_at"].is_string());

    Ok(())
}
