//! Durable layer for the Chronicle narration engine.
//!
//! Agent snapshots and configuration live in a Dragonfly
//! (Redis-compatible) instance behind a small blob-store abstraction.
//! The abstraction exists for two reasons: snapshot addressing is
//! path-like (`namespace/hash/revision.json`) rather than Redis-idiomatic,
//! and tests need a hermetic in-memory backend.
//!
//! # Modules
//!
//! - [`object_store`] -- enum-dispatch blob store (Dragonfly + in-memory)
//! - [`snapshot_store`] -- content-addressed scope-agent snapshots
//! - [`profile_store`] -- profiles by scope kind, overrides by scope id
//! - [`error`] -- shared error type

pub mod error;
pub mod object_store;
pub mod profile_store;
pub mod snapshot_store;

pub use error::StoreError;
pub use object_store::{DragonflyStore, MemoryStore, ObjectStore};
pub use profile_store::ProfileStore;
pub use snapshot_store::SnapshotStore;
