//! Profile and override configuration store.
//!
//! Kind-level profiles live at `profiles/<kind>.json`, per-scope
//! overrides at `overrides/<scope_id>.json`. Reads go through a cache
//! invalidated after a fixed interval; the interval is compared against
//! the logical clock value callers pass in, so cache behavior is
//! deterministic under test.
//!
//! A missing or unreadable profile is never an error: the built-in
//! default is substituted and the agent keeps running.

use std::collections::HashMap;

use chronicle_core::profile::merge;
use chronicle_types::{Profile, ScopeId, ScopeKind};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::object_store::ObjectStore;

/// Default cache invalidation interval.
pub const DEFAULT_CACHE_TTL_MS: i64 = 60_000;

/// A cached fetch result. Misses are cached too, so a missing override
/// does not hit the store on every event.
#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at_ms: i64,
    profile: Option<Profile>,
}

/// Read-through cached access to profiles and overrides.
#[derive(Debug)]
pub struct ProfileStore {
    store: ObjectStore,
    cache_ttl_ms: i64,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl ProfileStore {
    /// Wrap a blob store with the default cache interval.
    pub fn new(store: ObjectStore) -> Self {
        Self::with_ttl(store, DEFAULT_CACHE_TTL_MS)
    }

    /// Wrap a blob store with an explicit cache interval.
    pub fn with_ttl(store: ObjectStore, cache_ttl_ms: i64) -> Self {
        Self {
            store,
            cache_ttl_ms,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The kind-level profile, or the built-in default when none is
    /// stored or the stored document is unreadable.
    pub async fn profile_for(&self, kind: ScopeKind, now_ms: i64) -> Profile {
        let key = format!("profiles/{}.json", kind.as_str());
        self.fetch_cached(&key, now_ms).await.unwrap_or_else(|| {
            debug!(kind = %kind, "no stored profile, using built-in default");
            Profile::default()
        })
    }

    /// The per-scope override, when one is stored.
    pub async fn override_for(&self, scope_id: &ScopeId, now_ms: i64) -> Option<Profile> {
        let key = format!("overrides/{}.json", scope_id.as_str());
        self.fetch_cached(&key, now_ms).await
    }

    /// Resolve the effective profile for a scope: kind profile with the
    /// scope override merged on top.
    pub async fn resolve(&self, kind: ScopeKind, scope_id: &ScopeId, now_ms: i64) -> Profile {
        let base = self.profile_for(kind, now_ms).await;
        let over = self.override_for(scope_id, now_ms).await;
        merge(&base, over.as_ref())
    }

    /// Read a profile document through the cache.
    async fn fetch_cached(&self, key: &str, now_ms: i64) -> Option<Profile> {
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.get(key)
            && now_ms.saturating_sub(entry.fetched_at_ms) < self.cache_ttl_ms
        {
            return entry.profile.clone();
        }

        let profile = self.fetch(key).await;
        cache.insert(
            key.to_owned(),
            CacheEntry { fetched_at_ms: now_ms, profile: profile.clone() },
        );
        profile
    }

    /// Read and parse a profile document from the store.
    ///
    /// Store failures and malformed documents degrade to `None` with a
    /// warning; configuration problems must never take the engine down.
    async fn fetch(&self, key: &str) -> Option<Profile> {
        let body = match self.store.get(key).await {
            Ok(body) => body?,
            Err(e) => {
                warn!(key = key, error = %e, "profile fetch failed");
                return None;
            }
        };
        match serde_json::from_str(&body) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(key = key, error = %e, "profile document is malformed, ignoring");
                None
            }
        }
    }
}
