//! Descriptor sidecar configuration.
//!
//! Configuration is loaded once from environment variables. The client
//! secret is redacted in Debug output.

use common::jwt::{KeyFamily, DEFAULT_LEEWAY, MAX_LEEWAY};
use common::retry::{RetryPolicy, DEFAULT_INITIAL_BACKOFF, MAX_ATTEMPTS};
use common::secret::SecretString;
use common::token_issuer::IssuerConfig;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default schedule period in seconds.
pub const DEFAULT_SCHEDULE_INTERVAL_SECONDS: u64 = 15;

/// Descriptor sidecar configuration.
#[derive(Clone)]
pub struct Config {
    /// Identity provider base URL (e.g., `https://keycloak.example.com`).
    pub keycloak_base_url: String,

    /// Keycloak realm the client is registered in.
    pub keycloak_realm: String,

    /// OAuth client ID. Also the token cache identity.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Deployment manager base URL.
    pub deploy_manager_url: String,

    /// Base64 DER `SubjectPublicKeyInfo` used to verify inbound tokens.
    pub verify_public_key: String,

    /// Algorithm family of `verify_public_key` (default: RSA).
    pub verify_key_family: KeyFamily,

    /// `exp`/`nbf` leeway for inbound tokens (default: 0).
    pub jwt_leeway: Duration,

    /// Period between scheduled ticks (default: 15s).
    pub schedule_interval: Duration,

    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout for outbound calls. Unset means no timeout.
    pub http_timeout: Option<Duration>,

    /// Retry policy for token issuance and deployment-manager calls.
    pub retry_policy: RetryPolicy,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("keycloak_base_url", &self.keycloak_base_url)
            .field("keycloak_realm", &self.keycloak_realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("deploy_manager_url", &self.deploy_manager_url)
            .field("verify_key_family", &self.verify_key_family)
            .field("jwt_leeway", &self.jwt_leeway)
            .field("schedule_interval", &self.schedule_interval)
            .field("bind_address", &self.bind_address)
            .field("http_timeout", &self.http_timeout)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid verification key algorithm: {0}")]
    InvalidKeyAlgorithm(String),

    #[error("Invalid JWT leeway configuration: {0}")]
    InvalidJwtLeeway(String),

    #[error("Invalid schedule interval configuration: {0}")]
    InvalidScheduleInterval(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),

    #[error("Invalid retry configuration: {0}")]
    InvalidRetry(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// is out of range.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let keycloak_base_url = required(vars, "KEYCLOAK_BASE_URL")?;
        let keycloak_realm = required(vars, "KEYCLOAK_REALM")?;
        let client_id = required(vars, "KEYCLOAK_CLIENT_ID")?;
        let client_secret = SecretString::from(required(vars, "KEYCLOAK_CLIENT_SECRET")?);
        let deploy_manager_url = required(vars, "DEPLOY_MANAGER_URL")?;
        let verify_public_key = required(vars, "VERIFY_PUBLIC_KEY")?;

        let verify_key_family = match vars.get("VERIFY_KEY_ALGORITHM") {
            Some(value) => value
                .parse::<KeyFamily>()
                .map_err(|e| ConfigError::InvalidKeyAlgorithm(e.to_string()))?,
            None => KeyFamily::default(),
        };

        // Parse JWT leeway with validation
        let jwt_leeway = if let Some(value_str) = vars.get("JWT_LEEWAY_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtLeeway(format!(
                    "JWT_LEEWAY_SECONDS must be a non-negative integer, got '{value_str}': {e}"
                ))
            })?;

            if value > MAX_LEEWAY.as_secs() {
                return Err(ConfigError::InvalidJwtLeeway(format!(
                    "JWT_LEEWAY_SECONDS must not exceed {} seconds, got {value}",
                    MAX_LEEWAY.as_secs()
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_LEEWAY
        };

        // Parse schedule interval with validation
        let schedule_interval = if let Some(value_str) = vars.get("SCHEDULE_INTERVAL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidScheduleInterval(format!(
                    "SCHEDULE_INTERVAL_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidScheduleInterval(
                    "SCHEDULE_INTERVAL_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_SCHEDULE_INTERVAL_SECONDS)
        };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        // Timeout is opt-in; absent means outbound calls wait indefinitely
        let http_timeout = if let Some(value_str) = vars.get("HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidHttpTimeout(format!(
                    "HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidHttpTimeout(
                    "HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Some(Duration::from_secs(value))
        } else {
            None
        };

        let max_attempts = if let Some(value_str) = vars.get("RETRY_MAX_ATTEMPTS") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRetry(format!(
                    "RETRY_MAX_ATTEMPTS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 || value > MAX_ATTEMPTS {
                return Err(ConfigError::InvalidRetry(format!(
                    "RETRY_MAX_ATTEMPTS must be between 1 and {MAX_ATTEMPTS}, got {value}"
                )));
            }

            value
        } else {
            1
        };

        let initial_backoff = if let Some(value_str) = vars.get("RETRY_INITIAL_BACKOFF_MS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRetry(format!(
                    "RETRY_INITIAL_BACKOFF_MS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidRetry(
                    "RETRY_INITIAL_BACKOFF_MS must be greater than 0".to_string(),
                ));
            }

            Duration::from_millis(value)
        } else {
            DEFAULT_INITIAL_BACKOFF
        };

        let retry_policy =
            RetryPolicy::with_attempts(max_attempts).with_initial_backoff(initial_backoff);

        Ok(Config {
            keycloak_base_url,
            keycloak_realm,
            client_id,
            client_secret,
            deploy_manager_url,
            verify_public_key,
            verify_key_family,
            jwt_leeway,
            schedule_interval,
            bind_address,
            http_timeout,
            retry_policy,
        })
    }

    /// Identity provider settings for the token issuer.
    #[must_use]
    pub fn issuer_config(&self) -> IssuerConfig {
        IssuerConfig::new(
            self.keycloak_base_url.clone(),
            self.keycloak_realm.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
        )
        .with_http_timeout(self.http_timeout)
    }
}

/// Fetch a required variable; empty or whitespace-only counts as missing.
fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}
