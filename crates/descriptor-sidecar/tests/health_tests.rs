//! Public endpoint integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use sidecar_test_utils::*;

#[tokio::test]
async fn test_health_endpoint_returns_healthy() -> Result<()> {
    let server = TestSidecarServer::spawn().await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({"status": "healthy"}));

    Ok(())
}

/// `/health` stays up when the verification key is unusable.
#[tokio::test]
async fn test_health_ignores_key_material() -> Result<()> {
    let server = TestSidecarServer::spawn_with_vars(&[("VERIFY_PUBLIC_KEY", "!!")]).await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let server = TestSidecarServer::spawn().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<()> {
    let server = TestSidecarServer::spawn().await?;

    let response = reqwest::get(format!("{}/execute", server.url())).await?;

    assert_eq!(response.status(), 404);

    Ok(())
}
