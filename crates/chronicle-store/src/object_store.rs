//! Blob-store abstraction over Dragonfly with an in-memory test backend.
//!
//! Values are UTF-8 JSON documents addressed by path-like keys
//! (`snapshots/<hash>/<revision>.json`). Redis-style stores have no
//! cheap prefix listing, so every `put` also records the key in a
//! per-directory index set (`idx:<dir>`); `list` reads that set instead
//! of scanning the keyspace.
//!
//! Uses enum dispatch instead of trait objects because async methods
//! are not dyn-compatible in Rust.

use std::collections::BTreeMap;
use std::sync::Arc;

use fred::prelude::*;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::StoreError;

/// A blob store holding JSON documents under path-like keys.
pub enum ObjectStore {
    /// Dragonfly (Redis-compatible) backend.
    Dragonfly(DragonflyStore),
    /// In-memory backend for tests.
    Memory(MemoryStore),
}

impl ObjectStore {
    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the write fails.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            Self::Dragonfly(store) => store.put(key, value).await,
            Self::Memory(store) => store.put(key, value).await,
        }
    }

    /// Read the value at `key`.
    ///
    /// A missing key is not an error; it returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the read fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Self::Dragonfly(store) => store.get(key).await,
            Self::Memory(store) => store.get(key).await,
        }
    }

    /// List all keys under `prefix`, in no guaranteed order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the read fails.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Dragonfly(store) => store.list(prefix).await,
            Self::Memory(store) => store.list(prefix).await,
        }
    }

    /// Delete the value at `key` (and its index entry). Deleting a
    /// missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::Dragonfly(store) => store.delete(key).await,
            Self::Memory(store) => store.delete(key).await,
        }
    }

    /// A fresh in-memory store for tests.
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dragonfly(_) => f.debug_struct("ObjectStore::Dragonfly").finish(),
            Self::Memory(_) => f.debug_struct("ObjectStore::Memory").finish(),
        }
    }
}

/// The directory portion of a path-like key (`a/b/c.json` -> `a/b`).
fn dir_of(key: &str) -> &str {
    key.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Index-set key for a directory.
fn index_key(dir: &str) -> String {
    format!("idx:{dir}")
}

// ---------------------------------------------------------------------------
// Dragonfly backend
// ---------------------------------------------------------------------------

/// Dragonfly-backed blob store.
#[derive(Clone)]
pub struct DragonflyStore {
    client: Client,
}

impl DragonflyStore {
    /// Connect to Dragonfly at the given URL (`redis://host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed, or
    /// [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        info!("Connected to Dragonfly object store");
        Ok(Self { client })
    }

    /// Store a value and record the key in its directory index.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _: () = self.client.set(key, value, None, None, false).await?;
        let _: u32 = self.client.sadd(index_key(dir_of(key)), key).await?;
        Ok(())
    }

    /// Read a value by key.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = self.client.get(key).await?;
        Ok(value)
    }

    /// List keys under a prefix via the directory index.
    ///
    /// The index covers one directory level; the prefix is matched
    /// against the full keys so partial-directory prefixes still work.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = prefix.strip_suffix('/').unwrap_or_else(|| dir_of(prefix));
        let members: Vec<String> = self.client.smembers(index_key(dir)).await?;
        Ok(members.into_iter().filter(|k| k.starts_with(prefix)).collect())
    }

    /// Delete a value and its index entry.
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _: u32 = self.client.del(key).await?;
        let _: u32 = self.client.srem(index_key(dir_of(key)), key).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory blob store used by tests and local runs without Dragonfly.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
