//! Common utilities shared across the descriptor sidecar components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the issued credential model and token errors
pub mod credential;

/// Module for the in-memory credential cache with lazy expiry
pub mod token_cache;

/// Module for the OAuth 2.0 client-credentials token issuer
pub mod token_issuer;

/// Module for cache-first token acquisition
pub mod token_manager;

/// Module for opt-in retry with exponential backoff
pub mod retry;

/// Module for bearer token verification (signing keys, claims, validation)
pub mod jwt;

/// Fixed signing keys and token helpers for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
