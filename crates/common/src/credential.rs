//! Issued credential model and token acquisition errors.
//!
//! A [`Credential`] is exactly what the identity provider's token endpoint
//! returns for a client-credentials grant. It is immutable once issued; the
//! cache wraps it with an absolute expiry rather than mutating it.

use crate::secret::SecretString;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while acquiring a credential.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token request could not be built or sent (network, DNS,
    /// malformed URL, timeout, truncated body).
    #[error("Token request failed: {0}")]
    Transport(String),

    /// The identity provider answered with a non-success status.
    #[error("Token request rejected: {0}")]
    Rejected(String),

    /// The response body is not a valid credential document.
    #[error("Invalid token response: {0}")]
    Decode(String),

    /// The issuer could not be constructed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TokenError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Only transport failures qualify; a rejected or undecodable response
    /// will not change by asking again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokenError::Transport(_))
    }

    /// Bounded label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Transport(_) => "transport",
            TokenError::Rejected(_) => "rejected",
            TokenError::Decode(_) => "decode",
            TokenError::Configuration(_) => "configuration",
        }
    }
}

/// OAuth 2.0 token response from the identity provider.
///
/// `access_token` and `expires_in` are required; everything else is
/// optional pass-through. `expires_in` is signed because a zero or negative
/// lifetime is meaningful: the credential is already expired.
#[derive(Clone, Deserialize)]
pub struct Credential {
    /// Bearer token used on outbound calls.
    pub access_token: SecretString,

    /// Token type as declared by the provider (usually `Bearer`).
    #[serde(default)]
    pub token_type: String,

    /// Lifetime in seconds relative to issuance.
    pub expires_in: i64,

    #[serde(default)]
    pub refresh_token: Option<SecretString>,

    #[serde(default)]
    pub refresh_expires_in: Option<i64>,

    #[serde(default)]
    pub id_token: Option<SecretString>,

    #[serde(default, rename = "not-before-policy")]
    pub not_before_policy: Option<i64>,

    #[serde(default)]
    pub session_state: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

impl Credential {
    /// Create a bearer credential with only the required fields set.
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: None,
            refresh_expires_in: None,
            id_token: None,
            not_before_policy: None,
            session_state: None,
            scope: None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("not_before_policy", &self.not_before_policy)
            .field("session_state", &self.session_state)
            .field("scope", &self.scope)
            .finish()
    }
}
