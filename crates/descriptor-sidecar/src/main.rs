//! Descriptor Sidecar
//!
//! Entry point. Loads configuration, starts the scheduler and serves the
//! HTTP API until SIGINT/SIGTERM.

use anyhow::Context;
use common::token_cache::TokenCache;
use common::token_issuer::ClientCredentialsIssuer;
use common::token_manager::TokenFetcher;
use descriptor_sidecar::auth::BearerValidator;
use descriptor_sidecar::config::Config;
use descriptor_sidecar::models::ScheduleStatus;
use descriptor_sidecar::observability::metrics::init_metrics_recorder;
use descriptor_sidecar::routes::{self, AppState};
use descriptor_sidecar::services::deploy_manager::{DeployManagerClient, DeploymentManager};
use descriptor_sidecar::tasks::scheduler::{start_scheduler, token_metrics_callback};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "descriptor_sidecar=info,common=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting descriptor sidecar");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        keycloak_base_url = %config.keycloak_base_url,
        realm = %config.keycloak_realm,
        client_id = %config.client_id,
        deploy_manager_url = %config.deploy_manager_url,
        verify_key_family = %config.verify_key_family,
        schedule_interval_seconds = config.schedule_interval.as_secs(),
        bind_address = %config.bind_address,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize metrics")?;

    // Outbound: token fetcher and deployment manager client
    let issuer = ClientCredentialsIssuer::new(config.issuer_config())
        .context("Failed to build token issuer")?;
    let fetcher = TokenFetcher::new(
        config.client_id.clone(),
        Arc::new(issuer),
        Arc::new(TokenCache::new()),
    )
    .with_retry_policy(config.retry_policy)
    .with_callback(token_metrics_callback());

    let deploy_manager: Arc<dyn DeploymentManager> = Arc::new(
        DeployManagerClient::new(
            config.deploy_manager_url.clone(),
            config.http_timeout,
            config.retry_policy,
        )
        .context("Failed to build deployment manager client")?,
    );

    // Inbound: bearer validator. An unusable key does not stop startup.
    let validator = Arc::new(BearerValidator::new(
        &config.verify_public_key,
        config.verify_key_family,
        config.jwt_leeway,
    ));

    let (status_tx, status_rx) = watch::channel(ScheduleStatus::pending());
    let cancel_token = CancellationToken::new();

    let scheduler_handle = tokio::spawn(start_scheduler(
        fetcher,
        deploy_manager,
        config.schedule_interval,
        status_tx,
        cancel_token.clone(),
    ));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        schedule_status: status_rx,
        validator,
    });
    let app = routes::build_routes(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Descriptor sidecar listening on {}", addr);

    let shutdown_token = cancel_token.clone();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_token.cancel();
        })
        .await;

    // The server may also stop on error; make sure the scheduler stops too
    cancel_token.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task ended abnormally: {}", e);
    }

    serve_result.context("HTTP server failed")?;

    info!("Descriptor sidecar shutdown complete");

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
