//! In-memory credential cache keyed by client identity.
//!
//! Entries carry an absolute expiry computed at store time. There is no
//! background sweep: an expired entry is evicted by the `get` that finds it,
//! so memory is bounded by the number of identities actually requested.
//!
//! Time is read from [`tokio::time::Instant`], which lets tests pause and
//! advance the clock deterministically.

use crate::credential::Credential;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Upper bound on the lifetime honoured for a single entry (one year).
///
/// Keeps `Instant` arithmetic in range for absurd `expires_in` values.
const MAX_CACHE_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Credential storage capability.
///
/// Separated from [`crate::token_issuer::CredentialSource`] so callers can
/// substitute either side independently.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    /// Return the cached credential for `identity` if it is still valid.
    ///
    /// An entry whose expiry is at or before now is removed and `None` is
    /// returned.
    async fn get(&self, identity: &str) -> Option<Credential>;

    /// Store `credential` for `identity`, replacing any existing entry.
    ///
    /// Expiry is now plus `expires_in` seconds; zero or negative lifetimes
    /// are stored as already expired.
    async fn store(&self, identity: &str, credential: Credential);

    /// Remove the entry for `identity`. Returns whether one existed.
    async fn invalidate(&self, identity: &str) -> bool;
}

/// A credential plus the absolute instant it stops being served.
#[derive(Debug, Clone)]
pub struct CachedCredential {
    credential: Credential,
    expires_at: Instant,
}

impl CachedCredential {
    /// Wrap `credential`, computing expiry relative to `now`.
    #[must_use]
    pub fn new(credential: Credential, now: Instant) -> Self {
        let expires_at = match u64::try_from(credential.expires_in) {
            Ok(secs) if secs > 0 => now + Duration::from_secs(secs).min(MAX_CACHE_LIFETIME),
            _ => now,
        };

        Self {
            credential,
            expires_at,
        }
    }

    /// Valid iff `now` is strictly before expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    #[cfg(test)]
    fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

/// Thread-safe credential cache with lazy eviction.
///
/// Reads take the shared lock; eviction and store take the exclusive lock.
/// Eviction re-checks validity under the exclusive lock so a fresh entry
/// stored by a concurrent caller is never removed.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: RwLock<HashMap<String, CachedCredential>>,
}

impl TokenCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, including expired entries that
    /// have not been read since they expired.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialCache for TokenCache {
    async fn get(&self, identity: &str) -> Option<Credential> {
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(identity) {
                None => {
                    trace!(target: "common.token_cache", identity = %identity, "Cache miss");
                    return None;
                }
                Some(cached) if cached.is_valid_at(now) => {
                    trace!(target: "common.token_cache", identity = %identity, "Cache hit");
                    return Some(cached.credential.clone());
                }
                Some(_) => {}
            }
        }

        // Stale on the read path; evict under the write lock
        let mut entries = self.entries.write().await;
        if let Some(cached) = entries.get(identity) {
            if cached.is_valid_at(now) {
                return Some(cached.credential.clone());
            }
            entries.remove(identity);
            debug!(target: "common.token_cache", identity = %identity, "Evicted expired credential");
        }

        None
    }

    async fn store(&self, identity: &str, credential: Credential) {
        let cached = CachedCredential::new(credential, Instant::now());

        debug!(
            target: "common.token_cache",
            identity = %identity,
            expires_in_secs = cached.credential.expires_in,
            "Stored credential"
        );

        self.entries
            .write()
            .await
            .insert(identity.to_string(), cached);
    }

    async fn invalidate(&self, identity: &str) -> bool {
        let removed = self.entries.write().await.remove(identity).is_some();
        if removed {
            debug!(target: "common.token_cache", identity = %identity, "Invalidated credential");
        }
        removed
    }
}
