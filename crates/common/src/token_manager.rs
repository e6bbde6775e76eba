//! Cache-first token acquisition.
//!
//! [`TokenFetcher`] answers "give me a valid bearer credential for this
//! identity": a cache hit is returned as is, a miss goes to the issuer and
//! the result is stored before it is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_cache::TokenCache;
//! use common::token_issuer::{ClientCredentialsIssuer, IssuerConfig};
//! use common::token_manager::TokenFetcher;
//! use std::sync::Arc;
//!
//! let issuer = ClientCredentialsIssuer::new(issuer_config)?;
//! let fetcher = TokenFetcher::new(
//!     "ocm-sidecar",
//!     Arc::new(issuer),
//!     Arc::new(TokenCache::new()),
//! );
//!
//! let credential = fetcher.fetch_token().await?;
//! let header = format!("Bearer {}", credential.access_token.expose_secret());
//! ```
//!
//! Failed issuance is never cached, so the next call asks the provider again.

use crate::credential::{Credential, TokenError};
use crate::retry::{retry, RetryPolicy};
use crate::token_cache::CredentialCache;
use crate::token_issuer::CredentialSource;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Outcome of one `fetch_token` call, for metrics wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFetchEvent {
    /// Served from the cache.
    CacheHit,
    /// Issued by the provider and stored. `duration` covers issuance only.
    Issued { duration: Duration },
    /// Issuance failed with an error of the given kind.
    Failed { error_kind: &'static str },
}

impl TokenFetchEvent {
    /// Bounded label for the `source` metric dimension.
    #[must_use]
    pub fn source(&self) -> &'static str {
        match self {
            TokenFetchEvent::CacheHit => "cache",
            TokenFetchEvent::Issued { .. } => "issuer",
            TokenFetchEvent::Failed { .. } => "error",
        }
    }
}

/// Callback invoked after every fetch.
///
/// Lets the binary record metrics without this crate depending on a
/// metrics backend.
pub type TokenFetchCallback = Arc<dyn Fn(TokenFetchEvent) + Send + Sync>;

/// Couples a credential source with a cache for one client identity.
#[derive(Clone)]
pub struct TokenFetcher {
    identity: String,
    source: Arc<dyn CredentialSource>,
    cache: Arc<dyn CredentialCache>,
    retry_policy: RetryPolicy,
    on_fetch: Option<TokenFetchCallback>,
}

impl std::fmt::Debug for TokenFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenFetcher")
            .field("identity", &self.identity)
            .field("retry_policy", &self.retry_policy)
            .field("on_fetch", &self.on_fetch.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenFetcher {
    /// Create a fetcher with a single-attempt policy and no callback.
    #[must_use]
    pub fn new(
        identity: impl Into<String>,
        source: Arc<dyn CredentialSource>,
        cache: Arc<dyn CredentialCache>,
    ) -> Self {
        Self {
            identity: identity.into(),
            source,
            cache,
            retry_policy: RetryPolicy::none(),
            on_fetch: None,
        }
    }

    /// Retry transport failures during issuance according to `policy`.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Register a callback invoked after every fetch.
    #[must_use]
    pub fn with_callback(mut self, callback: TokenFetchCallback) -> Self {
        self.on_fetch = Some(callback);
        self
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Return a valid credential, issuing a new one on cache miss.
    ///
    /// # Errors
    ///
    /// Propagates the issuer's `TokenError` unchanged. Nothing is cached on
    /// failure.
    #[instrument(skip_all, name = "common.token_manager.fetch_token", fields(identity = %self.identity))]
    pub async fn fetch_token(&self) -> Result<Credential, TokenError> {
        if let Some(credential) = self.cache.get(&self.identity).await {
            debug!(target: "common.token_manager", identity = %self.identity, "Using cached token");
            self.emit(TokenFetchEvent::CacheHit);
            return Ok(credential);
        }

        debug!(
            target: "common.token_manager",
            identity = %self.identity,
            "No valid cached token, requesting a new one"
        );

        let start = Instant::now();
        let result = retry(
            &self.retry_policy,
            "token_issuance",
            TokenError::is_retryable,
            || self.source.request_new(),
        )
        .await;

        match result {
            Ok(credential) => {
                self.cache.store(&self.identity, credential.clone()).await;
                self.emit(TokenFetchEvent::Issued {
                    duration: start.elapsed(),
                });
                debug!(
                    target: "common.token_manager",
                    identity = %self.identity,
                    expires_in_secs = credential.expires_in,
                    "Acquired and cached new token"
                );
                Ok(credential)
            }
            Err(e) => {
                warn!(
                    target: "common.token_manager",
                    identity = %self.identity,
                    error = %e,
                    "Token acquisition failed"
                );
                self.emit(TokenFetchEvent::Failed {
                    error_kind: e.kind(),
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: TokenFetchEvent) {
        if let Some(callback) = &self.on_fetch {
            callback(event);
        }
    }
}
