//! Deployment manager HTTP client.
//!
//! Each tick triggers `GET {base}/execute` followed by
//! `GET {base}/resource/sync`, authenticated with the sidecar's own bearer
//! token. Only the status is inspected; the body is captured for trace
//! diagnostics.
//!
//! # Security
//!
//! - The bearer token is held as `SecretString` and never logged
//! - Captured exchanges omit request headers

use crate::observability::metrics::record_deploy_manager_call;
use common::retry::{retry, RetryPolicy};
use common::secret::{ExposeSecret, SecretString};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument, warn};

/// Deployment manager endpoints called by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Execute,
    Sync,
}

impl Endpoint {
    /// Path relative to the deployment manager base URL.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Execute => "/execute",
            Endpoint::Sync => "/resource/sync",
        }
    }

    /// Bounded label for logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Execute => "execute",
            Endpoint::Sync => "sync",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured request/response summary of one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub method: String,
    pub url: String,
    /// Status line, e.g. "200 OK".
    pub status: String,
    pub status_code: u16,
    pub body: String,
}

impl Exchange {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Render a status as "<code> <reason>", or just the code when the reason
/// is unknown.
#[must_use]
pub fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

/// Errors from deployment manager calls.
///
/// A non-2xx response is not an error; it is reported through
/// [`Exchange::status`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownstreamError {
    /// The request could not be sent or the response could not be read.
    #[error("Deployment manager {endpoint} call failed: {message}")]
    Transport { endpoint: Endpoint, message: String },

    /// The client could not be constructed.
    #[error("Deployment manager client misconfigured: {0}")]
    Configuration(String),
}

impl DownstreamError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, DownstreamError::Transport { .. })
    }
}

/// Trait for deployment manager operations (enables mocking).
#[async_trait::async_trait]
pub trait DeploymentManager: Send + Sync {
    /// `GET {base}/execute`.
    async fn trigger_execution(&self, token: &SecretString) -> Result<Exchange, DownstreamError>;

    /// `GET {base}/resource/sync`.
    async fn trigger_sync(&self, token: &SecretString) -> Result<Exchange, DownstreamError>;
}

/// HTTP client for the deployment manager.
#[derive(Clone)]
pub struct DeployManagerClient {
    client: Client,
    base_url: String,
    retry_policy: RetryPolicy,
}

impl fmt::Debug for DeployManagerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployManagerClient")
            .field("base_url", &self.base_url)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl DeployManagerClient {
    /// Create a new deployment manager client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Deployment manager base URL (e.g., "http://deploy-manager:8083")
    /// * `http_timeout` - Optional per-request timeout; `None` waits indefinitely
    /// * `retry_policy` - Applied to transport failures only
    ///
    /// # Errors
    ///
    /// Returns `DownstreamError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        http_timeout: Option<Duration>,
        retry_policy: RetryPolicy,
    ) -> Result<Self, DownstreamError> {
        let mut builder = Client::builder();
        if let Some(timeout) = http_timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            error!(target: "sidecar.services.deploy_manager", error = %e, "Failed to build HTTP client");
            DownstreamError::Configuration(e.to_string())
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_policy,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    #[instrument(skip_all, name = "sidecar.services.deploy_manager.call", fields(endpoint = %endpoint))]
    async fn call(
        &self,
        endpoint: Endpoint,
        token: &SecretString,
    ) -> Result<Exchange, DownstreamError> {
        let operation = format!("deploy_manager.{endpoint}");
        let result = retry(
            &self.retry_policy,
            &operation,
            DownstreamError::is_retryable,
            || self.send_once(endpoint, token),
        )
        .await;

        match &result {
            Ok(exchange) => {
                record_deploy_manager_call(endpoint.as_str(), &exchange.status_code.to_string());
            }
            Err(_) => record_deploy_manager_call(endpoint.as_str(), "error"),
        }

        result
    }

    async fn send_once(
        &self,
        endpoint: Endpoint,
        token: &SecretString,
    ) -> Result<Exchange, DownstreamError> {
        let url = self.url_for(endpoint);

        let transport = |e: reqwest::Error| {
            warn!(
                target: "sidecar.services.deploy_manager",
                endpoint = %endpoint,
                error = %e,
                "Deployment manager request failed"
            );
            DownstreamError::Transport {
                endpoint,
                message: e.to_string(),
            }
        };

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        let exchange = Exchange {
            method: "GET".to_string(),
            url,
            status: status_line(status),
            status_code: status.as_u16(),
            body,
        };

        tracing::trace!(
            target: "sidecar.services.deploy_manager",
            method = %exchange.method,
            url = %exchange.url,
            status = %exchange.status,
            body = %exchange.body,
            "Deployment manager exchange"
        );

        if exchange.is_success() {
            tracing::debug!(
                target: "sidecar.services.deploy_manager",
                endpoint = %endpoint,
                status = %exchange.status,
                "Deployment manager call completed"
            );
        } else {
            warn!(
                target: "sidecar.services.deploy_manager",
                endpoint = %endpoint,
                status = %exchange.status,
                "Deployment manager returned non-success status"
            );
        }

        Ok(exchange)
    }
}

#[async_trait::async_trait]
impl DeploymentManager for DeployManagerClient {
    async fn trigger_execution(&self, token: &SecretString) -> Result<Exchange, DownstreamError> {
        self.call(Endpoint::Execute, token).await
    }

    async fn trigger_sync(&self, token: &SecretString) -> Result<Exchange, DownstreamError> {
        self.call(Endpoint::Sync, token).await
    }
}

/// Mock deployment manager for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// What a mocked endpoint answers with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockOutcome {
        /// Respond with this HTTP status.
        Status(u16),
        /// Fail as if the connection were refused.
        TransportError,
    }

    /// Mock deployment manager with per-endpoint outcomes and call counters.
    pub struct MockDeploymentManager {
        execute: MockOutcome,
        sync: MockOutcome,
        execute_calls: AtomicUsize,
        sync_calls: AtomicUsize,
        last_token: Mutex<Option<String>>,
    }

    impl MockDeploymentManager {
        /// Both endpoints answer 200 OK.
        #[must_use]
        pub fn healthy() -> Self {
            Self::new(MockOutcome::Status(200), MockOutcome::Status(200))
        }

        #[must_use]
        pub fn new(execute: MockOutcome, sync: MockOutcome) -> Self {
            Self {
                execute,
                sync,
                execute_calls: AtomicUsize::new(0),
                sync_calls: AtomicUsize::new(0),
                last_token: Mutex::new(None),
            }
        }

        pub fn execute_calls(&self) -> usize {
            self.execute_calls.load(Ordering::SeqCst)
        }

        pub fn sync_calls(&self) -> usize {
            self.sync_calls.load(Ordering::SeqCst)
        }

        /// Bearer token presented on the most recent call.
        pub async fn last_token(&self) -> Option<String> {
            self.last_token.lock().await.clone()
        }

        async fn answer(
            &self,
            endpoint: Endpoint,
            outcome: MockOutcome,
            token: &SecretString,
        ) -> Result<Exchange, DownstreamError> {
            *self.last_token.lock().await = Some(token.expose_secret().to_string());

            match outcome {
                MockOutcome::TransportError => Err(DownstreamError::Transport {
                    endpoint,
                    message: "connection refused".to_string(),
                }),
                MockOutcome::Status(code) => {
                    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::OK);
                    Ok(Exchange {
                        method: "GET".to_string(),
                        url: format!("http://deploy-manager.mock{}", endpoint.path()),
                        status: status_line(status),
                        status_code: status.as_u16(),
                        body: String::new(),
                    })
                }
            }
        }
    }

    #[async_trait::async_trait]
    impl DeploymentManager for MockDeploymentManager {
        async fn trigger_execution(
            &self,
            token: &SecretString,
        ) -> Result<Exchange, DownstreamError> {
            self.execute_calls.fetch_add(1, Ordering::SeqCst);
            self.answer(Endpoint::Execute, self.execute, token).await
        }

        async fn trigger_sync(&self, token: &SecretString) -> Result<Exchange, DownstreamError> {
            self.sync_calls.fetch_add(1, Ordering::SeqCst);
            self.answer(Endpoint::Sync, self.sync, token).await
        }
    }

}
