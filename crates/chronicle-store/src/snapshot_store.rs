//! Content-addressed snapshot persistence for scope agents.
//!
//! A snapshot is the serialized agent written under
//! `<namespace>/<sha256(scope_id)>/<revision>.json`, where the revision
//! is the save-time clock value in unix milliseconds, zero-padded so
//! lexicographic order equals numeric order. Multiple revisions coexist
//! under the same hash prefix; the loader deterministically picks the
//! lexicographically-last key. A missing snapshot is not an error -- it
//! just means the caller starts from a fresh agent.

use chronicle_types::{ScopeAgent, ScopeId};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::StoreError;
use crate::object_store::ObjectStore;

/// Snapshot persistence over the blob store.
#[derive(Debug)]
pub struct SnapshotStore {
    store: ObjectStore,
}

impl SnapshotStore {
    /// Wrap a blob store.
    pub const fn new(store: ObjectStore) -> Self {
        Self { store }
    }

    /// Persist a new snapshot revision for an agent.
    ///
    /// The namespace comes from the agent's resolved profile; `now_ms`
    /// is the logical clock value used as the revision suffix. Returns
    /// the key the snapshot was written under.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the write fails.
    pub async fn save(&self, agent: &ScopeAgent, now_ms: i64) -> Result<String, StoreError> {
        let key = revision_key(&agent.profile.snapshot_namespace, &agent.scope_id, now_ms);
        let body = serde_json::to_string(agent)?;
        self.store.put(&key, &body).await?;
        debug!(scope_id = %agent.scope_id, key = key, "snapshot saved");
        Ok(key)
    }

    /// Load the current snapshot for a scope, if any exists.
    ///
    /// Lists all revisions under the scope's hash prefix and reads the
    /// lexicographically-last one. Returns `Ok(None)` when no revision
    /// exists or the object vanished between list and get.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails or the snapshot body
    /// does not deserialize.
    pub async fn load(
        &self,
        namespace: &str,
        scope_id: &ScopeId,
    ) -> Result<Option<ScopeAgent>, StoreError> {
        let prefix = hash_prefix(namespace, scope_id);
        let mut keys = self.store.list(&prefix).await?;
        keys.sort();

        let Some(newest) = keys.last() else {
            debug!(scope_id = %scope_id, "no prior snapshot");
            return Ok(None);
        };

        let Some(body) = self.store.get(newest).await? else {
            return Ok(None);
        };

        let agent: ScopeAgent = serde_json::from_str(&body)?;
        debug!(scope_id = %scope_id, key = %newest, "snapshot loaded");
        Ok(Some(agent))
    }

    /// Delete all but the newest `keep` revisions for a scope.
    ///
    /// Returns the number of revisions deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if listing or deleting fails.
    pub async fn prune(
        &self,
        namespace: &str,
        scope_id: &ScopeId,
        keep: usize,
    ) -> Result<usize, StoreError> {
        let prefix = hash_prefix(namespace, scope_id);
        let mut keys = self.store.list(&prefix).await?;
        keys.sort();

        let excess = keys.len().saturating_sub(keep.max(1));
        let stale: Vec<String> = keys.into_iter().take(excess).collect();
        for key in &stale {
            self.store.delete(key).await?;
        }
        if !stale.is_empty() {
            debug!(scope_id = %scope_id, pruned = stale.len(), "snapshot revisions pruned");
        }
        Ok(stale.len())
    }
}

/// The hash-prefix directory for a scope: `<namespace>/<sha256-hex>/`.
fn hash_prefix(namespace: &str, scope_id: &ScopeId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope_id.as_str().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{namespace}/{hex}/")
}

/// Full revision key: zero-padded millisecond suffix keeps listing
/// order equal to save order.
fn revision_key(namespace: &str, scope_id: &ScopeId, now_ms: i64) -> String {
    let millis = now_ms.max(0);
    format!("{}{millis:020}.json", hash_prefix(namespace, scope_id))
}
