//! # Trust Cache
//!
//! Time-bounded cache of the two artifacts token verification depends on:
//! the IdP discovery document (keyed by discovery URL) and its signing key
//! set (keyed by `jwks_uri`).
//!
//! ## Refresh semantics
//!
//! - An entry is served while younger than the TTL. Expired entries are never
//!   served, not even when a refresh fails.
//! - Refresh is single-flight per key: each key owns an async `RwLock`. The
//!   first caller to find the entry absent or expired takes the write lock and
//!   fetches; concurrent callers for the same key queue on the lock and reuse
//!   the outcome, success or failure, instead of issuing their own request.
//! - A failed fetch is never cached. Callers already queued behind it
//!   receive the same error; callers arriving afterwards fetch again.
//!
//! The cache is an explicit object constructed once and shared by reference
//! with validator strategies. There is no global state.

mod fetch;
mod material;
mod retry;

pub use fetch::{HttpFetcher, TrustFetcher, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
pub use material::{DiscoveryDocument, KeySet, SigningKey};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::TrustError;

/// Default time-to-live for cached trust material.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

struct Cached<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

/// State behind one key's lock. `failure` holds the error of the most
/// recent attempt when it failed, and is cleared by a success.
struct Entry<T> {
    cached: Option<Cached<T>>,
    failure: Option<TrustError>,
}

impl<T> Entry<T> {
    fn fresh(&self, ttl: Duration) -> Option<Arc<T>> {
        self.cached
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < ttl)
            .map(|cached| Arc::clone(&cached.value))
    }
}

/// One key. `attempts` counts completed fetches and is read before waiting
/// on the lock, so a caller can tell whether a fetch finished while it was
/// queued.
struct Slot<T> {
    attempts: AtomicU64,
    entry: RwLock<Entry<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            entry: RwLock::new(Entry {
                cached: None,
                failure: None,
            }),
        }
    }
}

/// Per-key single-flight TTL map.
struct KeyedCache<T> {
    slots: parking_lot::Mutex<HashMap<String, Arc<Slot<T>>>>,
}

impl<T> KeyedCache<T> {
    fn new() -> Self {
        Self {
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> Arc<Slot<T>> {
        // The outer lock is only held to find or create the slot, never
        // across an await.
        self.slots
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<Arc<T>, TrustError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TrustError>>,
    {
        let slot = self.slot(key);
        let seen = slot.attempts.load(Ordering::Acquire);

        if let Some(value) = slot.entry.read().await.fresh(ttl) {
            return Ok(value);
        }

        let mut entry = slot.entry.write().await;
        // A fetch completed while we were queued: share its outcome instead
        // of issuing another request.
        if let Some(value) = entry.fresh(ttl) {
            return Ok(value);
        }
        if slot.attempts.load(Ordering::Acquire) != seen {
            if let Some(failure) = &entry.failure {
                return Err(failure.clone());
            }
        }

        let outcome = fetch().await;
        let result = match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                entry.cached = Some(Cached {
                    value: Arc::clone(&value),
                    fetched_at: Instant::now(),
                });
                entry.failure = None;
                Ok(value)
            }
            Err(e) => {
                entry.failure = Some(e.clone());
                Err(e)
            }
        };
        slot.attempts.fetch_add(1, Ordering::Release);
        result
    }
}

/// Shared cache of discovery documents and key sets.
pub struct TrustCache {
    fetcher: Arc<dyn TrustFetcher>,
    ttl: Duration,
    discovery: KeyedCache<DiscoveryDocument>,
    jwks: KeyedCache<KeySet>,
}

impl std::fmt::Debug for TrustCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TrustCache {
    pub fn new(fetcher: Arc<dyn TrustFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            discovery: KeyedCache::new(),
            jwks: KeyedCache::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Discovery document for `discovery_url`.
    pub async fn discover(
        &self,
        discovery_url: &str,
    ) -> Result<Arc<DiscoveryDocument>, TrustError> {
        self.discovery
            .get_or_fetch(discovery_url, self.ttl, || async {
                let body = self.fetcher.fetch_json(discovery_url).await.map_err(|e| {
                    tracing::error!(
                        url = discovery_url,
                        error = %e,
                        "unable to discover IdP auth server details"
                    );
                    e
                })?;
                let doc = DiscoveryDocument::from_json(discovery_url, body)?;
                tracing::info!(
                    url = discovery_url,
                    issuer = %doc.issuer,
                    "discovery document refreshed"
                );
                Ok(doc)
            })
            .await
    }

    /// Signing keys published at `discovery.jwks_uri`.
    pub async fn jwks(&self, discovery: &DiscoveryDocument) -> Result<Arc<KeySet>, TrustError> {
        let url = discovery.jwks_uri.as_str();
        self.jwks
            .get_or_fetch(url, self.ttl, || async {
                let body = self.fetcher.fetch_json(url).await.map_err(|e| {
                    tracing::error!(url, error = %e, "unable to retrieve signing keys from IdP");
                    e
                })?;
                let keys = KeySet::from_json(url, body)?;
                tracing::info!(url, keys = keys.len(), "signing keys refreshed");
                Ok(keys)
            })
            .await
    }
}
