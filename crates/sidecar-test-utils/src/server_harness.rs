//! Test server harness for E2E testing
//!
//! Provides `TestSidecarServer` for spawning real sidecar instances in tests.

use common::testing::{TEST_CLIENT_ID, TEST_REALM, TEST_RSA_PUBLIC_KEY_B64};
use common::token_cache::TokenCache;
use common::token_issuer::ClientCredentialsIssuer;
use common::token_manager::TokenFetcher;
use descriptor_sidecar::auth::BearerValidator;
use descriptor_sidecar::config::Config;
use descriptor_sidecar::models::ScheduleStatus;
use descriptor_sidecar::routes::{self, AppState};
use descriptor_sidecar::services::deploy_manager::{DeployManagerClient, DeploymentManager};
use descriptor_sidecar::tasks::scheduler::{start_scheduler, token_metrics_callback};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Environment for a sidecar that talks to nothing reachable.
pub fn test_vars() -> HashMap<String, String> {
    HashMap::from([
        (
            "KEYCLOAK_BASE_URL".to_string(),
            "http://127.0.0.1:1".to_string(),
        ),
        ("KEYCLOAK_REALM".to_string(), TEST_REALM.to_string()),
        ("KEYCLOAK_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
        (
            "KEYCLOAK_CLIENT_SECRET".to_string(),
            "test-client-secret".to_string(),
        ),
        (
            "DEPLOY_MANAGER_URL".to_string(),
            "http://127.0.0.1:1".to_string(),
        ),
        (
            "VERIFY_PUBLIC_KEY".to_string(),
            TEST_RSA_PUBLIC_KEY_B64.to_string(),
        ),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
    ])
}

/// Test harness for spawning the descriptor sidecar in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> anyhow::Result<()> {
///     let server = TestSidecarServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestSidecarServer {
    addr: SocketAddr,
    config: Config,
    status_tx: Option<watch::Sender<ScheduleStatus>>,
    status_rx: watch::Receiver<ScheduleStatus>,
    cancel_token: CancellationToken,
    _handle: JoinHandle<()>,
    scheduler: Option<JoinHandle<()>>,
}

impl TestSidecarServer {
    /// Spawn a server with the test RSA key and no scheduler.
    ///
    /// Scheduler status can be driven with [`TestSidecarServer::publish_status`].
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&[]).await
    }

    /// Spawn a server with `overrides` applied on top of [`test_vars`] and
    /// no scheduler.
    pub async fn spawn_with_vars(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let config = config_with(overrides)?;
        let (status_tx, status_rx) = watch::channel(ScheduleStatus::pending());

        let mut server = Self::serve(config, status_rx).await?;
        server.status_tx = Some(status_tx);
        Ok(server)
    }

    /// Spawn a server with a running scheduler against the given identity
    /// provider and deployment manager.
    pub async fn spawn_with_scheduler(
        keycloak_url: &str,
        deploy_manager_url: &str,
        interval_seconds: u64,
    ) -> Result<Self, anyhow::Error> {
        let interval = interval_seconds.to_string();
        let config = config_with(&[
            ("KEYCLOAK_BASE_URL", keycloak_url),
            ("DEPLOY_MANAGER_URL", deploy_manager_url),
            ("SCHEDULE_INTERVAL_SECONDS", &interval),
            ("HTTP_TIMEOUT_SECONDS", "5"),
        ])?;

        let issuer = ClientCredentialsIssuer::new(config.issuer_config())
            .map_err(|e| anyhow::anyhow!("Failed to build issuer: {}", e))?;
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
            .map_err(|e| anyhow::anyhow!("Failed to build deployment manager client: {}", e))?,
        );

        let (status_tx, status_rx) = watch::channel(ScheduleStatus::pending());
        let period = config.schedule_interval;

        let mut server = Self::serve(config, status_rx).await?;
        server.scheduler = Some(tokio::spawn(start_scheduler(
            fetcher,
            deploy_manager,
            period,
            status_tx,
            server.cancel_token.clone(),
        )));
        Ok(server)
    }

    async fn serve(
        config: Config,
        status_rx: watch::Receiver<ScheduleStatus>,
    ) -> Result<Self, anyhow::Error> {
        let validator = Arc::new(BearerValidator::new(
            &config.verify_public_key,
            config.verify_key_family,
            config.jwt_leeway,
        ));

        let state = Arc::new(AppState {
            schedule_status: status_rx.clone(),
            validator,
        });

        // Handle from a recorder that is never installed globally
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            status_tx: None,
            status_rx,
            cancel_token: CancellationToken::new(),
            _handle: handle,
            scheduler: None,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the published scheduler status.
    ///
    /// # Panics
    ///
    /// If the server was spawned with a real scheduler.
    pub fn publish_status(&self, status: ScheduleStatus) {
        self.status_tx
            .as_ref()
            .expect("status is owned by the scheduler")
            .send_replace(status);
    }

    /// Wait until at least `ticks` scheduler ticks have completed.
    pub async fn wait_for_ticks(
        &self,
        ticks: u64,
        timeout: Duration,
    ) -> Result<ScheduleStatus, anyhow::Error> {
        let mut rx = self.status_rx.clone();
        let status = tokio::time::timeout(timeout, rx.wait_for(|s| s.ticks >= ticks))
            .await
            .map_err(|_| anyhow::anyhow!("Timed out waiting for {} ticks", ticks))?
            .map_err(|e| anyhow::anyhow!("Status channel closed: {}", e))?
            .clone();
        Ok(status)
    }

    /// Stop the scheduler and wait for its in-flight tick to finish.
    pub async fn stop_scheduler(&mut self) -> Result<(), anyhow::Error> {
        self.cancel_token.cancel();
        if let Some(handle) = self.scheduler.take() {
            handle
                .await
                .map_err(|e| anyhow::anyhow!("Scheduler task failed: {}", e))?;
        }
        Ok(())
    }
}

impl Drop for TestSidecarServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(scheduler) = &self.scheduler {
            scheduler.abort();
        }
        self._handle.abort();
    }
}

fn config_with(overrides: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
    let mut vars = test_vars();
    for (name, value) in overrides {
        vars.insert((*name).to_string(), (*value).to_string());
    }
    Config::from_vars(&vars).map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))
}
