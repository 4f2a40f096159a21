//! Pure engine logic for the Chronicle narration engine.
//!
//! Everything in this crate is a function of its inputs: temporal
//! clustering of buffered events, visibility-region computation, profile
//! override merging, and the time-context description sent to the
//! oracle. No I/O, no locks, no clocks other than the millisecond values
//! handed in -- which is what makes the interesting decisions here
//! testable without a running bus or store.

pub mod cluster;
pub mod profile;
pub mod timectx;
pub mod visibility;

pub use cluster::{cluster_events, Cluster, CLUSTER_GAP_MS};
pub use profile::merge;
pub use timectx::{Season, TimeContext, TimeOfDay};
pub use visibility::compute_visibility;
