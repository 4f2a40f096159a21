//! Shared type definitions for the Chronicle narration engine.
//!
//! Everything that crosses a crate boundary lives here: identifier
//! newtypes, the wire-level event type, scope agents and their profiles,
//! world-space geometry, and the oracle reply shape. Keeping the types in
//! one dependency-light crate lets the stores, the oracle client, and the
//! engine agree on serialization without pulling in each other's stacks.

pub mod event;
pub mod geometry;
pub mod keys;
pub mod oracle;
pub mod profile;
pub mod scope;

pub use event::{ControlKind, StateChange, StateOp, WorldEvent};
pub use geometry::{Geometry, Point, Region};
pub use keys::{EntityId, EventId, ScopeId, WorldId};
pub use oracle::{CandidateEvent, OracleReply, MAX_CANDIDATE_EVENTS};
pub use profile::Profile;
pub use scope::{HistoryEntry, ScopeAgent, ScopeKind};
