//! OAuth 2.0 client-credentials issuer.
//!
//! Performs a single token exchange against a Keycloak-style realm. The
//! issuer never retries; callers wrap it with [`crate::retry`] when they want
//! that, and put a [`crate::token_cache::CredentialCache`] in front of it to
//! avoid asking for a token on every call.
//!
//! # Security
//!
//! - Client secret is stored as `SecretString` (never logged)
//! - Error response bodies are logged at trace level only
//! - Issued tokens are wrapped in `SecretString` during decode

use crate::credential::{Credential, TokenError};
use crate::secret::{ExposeSecret, SecretString};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

/// Credential issuance capability.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Request a fresh credential from the identity provider.
    ///
    /// # Errors
    ///
    /// - `TokenError::Transport` - request could not be sent or read
    /// - `TokenError::Rejected` - provider answered with a non-success status
    /// - `TokenError::Decode` - body is not a credential document
    async fn request_new(&self) -> Result<Credential, TokenError>;
}

/// Identity provider connection settings.
#[derive(Clone)]
pub struct IssuerConfig {
    /// Provider base URL (e.g., `https://keycloak.example.com`).
    pub base_url: String,

    /// Realm the client is registered in.
    pub realm: String,

    /// OAuth client ID. Also used as the cache identity.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Per-request timeout. `None` waits indefinitely.
    pub http_timeout: Option<Duration>,
}

impl std::fmt::Debug for IssuerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerConfig")
            .field("base_url", &self.base_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl IssuerConfig {
    /// Create a configuration with no request timeout.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            client_secret,
            http_timeout: None,
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Token endpoint for the configured realm.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url.trim_end_matches('/'),
            self.realm
        )
    }
}

/// Client-credentials grant against `{base}/realms/{realm}/protocol/openid-connect/token`.
pub struct ClientCredentialsIssuer {
    config: IssuerConfig,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for ClientCredentialsIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsIssuer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClientCredentialsIssuer {
    /// Build an issuer and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: IssuerConfig) -> Result<Self, TokenError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder
            .build()
            .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    #[must_use]
    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }
}

#[async_trait]
impl CredentialSource for ClientCredentialsIssuer {
    #[instrument(skip_all, name = "common.token_issuer.request_new", fields(client_id = %self.config.client_id))]
    async fn request_new(&self) -> Result<Credential, TokenError> {
        let url = self.config.token_url();

        debug!(
            target: "common.token_issuer",
            url = %url,
            "Requesting token from identity provider"
        );

        let form_body = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "client_credentials"),
            ("client_secret", self.config.client_secret.expose_secret()),
        ];

        let response = self
            .http_client
            .post(&url)
            .form(&form_body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "common.token_issuer", error = %e, "HTTP request failed");
                TokenError::Transport(e.to_string())
            })?;

        let status = response.status();

        let body = response.bytes().await.map_err(|e| {
            debug!(target: "common.token_issuer", error = %e, "Failed to read response body");
            TokenError::Transport(e.to_string())
        })?;

        if !status.is_success() {
            warn!(
                target: "common.token_issuer",
                status = %status,
                "Token request rejected by identity provider"
            );
            trace!(
                target: "common.token_issuer",
                body = %String::from_utf8_lossy(&body),
                "Rejection response body"
            );
            return Err(TokenError::Rejected(format!("Status {status}")));
        }

        let credential: Credential = serde_json::from_slice(&body).map_err(|e| {
            warn!(target: "common.token_issuer", error = %e, "Failed to parse token response");
            TokenError::Decode(e.to_string())
        })?;

        if credential.access_token.expose_secret().is_empty() {
            warn!(target: "common.token_issuer", "Token response carried an empty access token");
            return Err(TokenError::Decode("access_token is empty".to_string()));
        }

        debug!(
            target: "common.token_issuer",
            expires_in_secs = credential.expires_in,
            "Token issued"
        );

        Ok(credential)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN_PATH: &str = "/realms/ocm/protocol/openid-connect/token";

    fn test_config(base_url: &str) -> IssuerConfig {
        IssuerConfig::new(
            base_url,
            "ocm",
            "ocm-sidecar",
            SecretString::from("test-secret"),
        )
    }

    fn issuer(base_url: &str) -> ClientCredentialsIssuer {
        ClientCredentialsIssuer::new(test_config(base_url)).unwrap()
    }

    #[test]
    fn test_token_url_composition() {
        let config = test_config("https://idp.example.com");
        assert_eq!(
            config.token_url(),
            "https://idp.example.com/realms/ocm/protocol/openid-connect/token"
        );

        let config = test_config("https://idp.example.com/");
        assert_eq!(
            config.token_url(),
            "https://idp.example.com/realms/ocm/protocol/openid-connect/token"
        );
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = IssuerConfig::new(
            "http://localhost",
            "ocm",
            "client",
            SecretString::from("super-secret-value"),
        );

        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super-secret-value"));
    }

    #[test]
    fn test_config_timeout_defaults_to_none() {
        let config = test_config("http://localhost");
        assert!(config.http_timeout.is_none());

        let config = config.with_http_timeout(Some(Duration::from_secs(5)));
        assert_eq!(config.http_timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_request_new_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=ocm-sidecar"))
            .and(body_string_contains("client_secret=test-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "issued-token",
                "token_type": "Bearer",
                "expires_in": 300,
                "refresh_expires_in": 0,
                "not-before-policy": 0,
                "scope": "profile email"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let credential = issuer(&mock_server.uri()).request_new().await.unwrap();

        assert_eq!(credential.access_token.expose_secret(), "issued-token");
        assert_eq!(credential.expires_in, 300);
        assert_eq!(credential.scope.as_deref(), Some("profile email"));
    }

    #[tokio::test]
    async fn test_request_new_rejected_on_401() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "unauthorized_client",
                "error_description": "Invalid client secret"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = issuer(&mock_server.uri()).request_new().await.unwrap_err();

        assert!(matches!(err, TokenError::Rejected(_)));
        // The provider's body stays out of the error message
        assert!(!err.to_string().contains("Invalid client secret"));
    }

    #[tokio::test]
    async fn test_request_new_rejected_on_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let err = issuer(&mock_server.uri()).request_new().await.unwrap_err();

        assert!(matches!(err, TokenError::Rejected(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_request_new_decode_error_on_non_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&mock_server)
            .await;

        let err = issuer(&mock_server.uri()).request_new().await.unwrap_err();

        assert!(matches!(err, TokenError::Decode(_)));
    }

    #[tokio::test]
    async fn test_request_new_decode_error_on_missing_fields() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "no-lifetime" })),
            )
            .mount(&mock_server)
            .await;

        let err = issuer(&mock_server.uri()).request_new().await.unwrap_err();

        assert!(matches!(err, TokenError::Decode(_)));
    }

    #[tokio::test]
    async fn test_request_new_decode_error_on_empty_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "",
                "expires_in": 60
            })))
            .mount(&mock_server)
            .await;

        let err = issuer(&mock_server.uri()).request_new().await.unwrap_err();

        assert!(matches!(err, TokenError::Decode(_)));
    }

    #[tokio::test]
    async fn test_request_new_transport_error_when_unreachable() {
        // Nothing listens on port 1
        let err = issuer("http://127.0.0.1:1").request_new().await.unwrap_err();

        assert!(matches!(err, TokenError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_request_new_transport_error_on_malformed_url() {
        let err = issuer("not a url").request_new().await.unwrap_err();

        assert!(matches!(err, TokenError::Transport(_)));
    }

    #[tokio::test]
    async fn test_request_new_times_out_when_configured() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "access_token": "late-token",
                        "expires_in": 60
                    }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let config =
            test_config(&mock_server.uri()).with_http_timeout(Some(Duration::from_millis(100)));
        let err = ClientCredentialsIssuer::new(config)
            .unwrap()
            .request_new()
            .await
            .unwrap_err();

        assert!(matches!(err, TokenError::Transport(_)));
    }
}
