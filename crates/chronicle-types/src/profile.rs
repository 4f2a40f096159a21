//! Scope configuration profiles.
//!
//! A [`Profile`] is resolved per scope kind and then specialized by an
//! optional per-scope override (see `chronicle_core::profile::merge`). An
//! agent's profile is never absent: when the profile store has nothing
//! for a kind, the built-in [`Profile::default`] is substituted.

use serde::{Deserialize, Serialize};

/// Tunable configuration for a scope agent.
///
/// Zero/empty fields in a stored profile mean "inherit" -- the merge
/// keeps the base value. The [`Default`] impl is the built-in fallback
/// used when no profile is stored at all, so its values are deliberately
/// non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Human-scale label for the narration window (`"10m"`, `"5m"`).
    pub time_window: String,
    /// Maximum number of history entries kept when eviction is enabled.
    pub buffer_limit: u32,
    /// Whether history beyond `buffer_limit` is evicted oldest-first.
    /// Disabling this is the "never evict" mode.
    pub evict_overflow: bool,
    /// Minimum interval between scheduled batch narrations, in
    /// milliseconds. The expiry timer also derives from this.
    pub trigger_interval_ms: u64,
    /// History length at which a batch narration is dispatched.
    pub max_events: u32,
    /// Event types that force immediate narration instead of buffering.
    pub narrative_triggers: Vec<String>,
    /// Object-store namespace under which snapshots are written.
    pub snapshot_namespace: String,
    /// Explicit visibility buffer distance in world units. Zero means
    /// unset; location and region scopes then get the implicit buffer.
    pub visibility_buffer: f64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            time_window: "10m".to_owned(),
            buffer_limit: 100,
            evict_overflow: true,
            trigger_interval_ms: 60_000,
            max_events: 50,
            narrative_triggers: Vec::new(),
            snapshot_namespace: "snapshots".to_owned(),
            visibility_buffer: 0.0,
        }
    }
}

impl Profile {
    /// Whether an event type is a narrative trigger for this profile.
    pub fn is_trigger(&self, event_type: &str) -> bool {
        self.narrative_triggers.iter().any(|t| t == event_type)
    }
}
