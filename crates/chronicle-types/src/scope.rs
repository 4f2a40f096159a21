//! Scope agents: the stateful unit tracked per scope.
//!
//! A scope is a bounded logical or spatial area of interest -- a player,
//! a group, a location, a region, or a whole world -- and owns exactly
//! one narrator agent. The agent is plain data here; all mutation goes
//! through the registry so that the event-delivery path, the scheduler,
//! and running narration pipelines share one locking discipline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Geometry, Region};
use crate::keys::{EntityId, EventId, ScopeId, WorldId};
use crate::profile::Profile;

/// The kind of scope an agent narrates.
///
/// Unknown kinds on the wire deserialize as [`ScopeKind::World`], which
/// gets an unbounded visibility region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// A single player.
    Player,
    /// A party or other group of entities.
    Group,
    /// A bounded place.
    Location,
    /// A larger area containing locations.
    Region,
    /// A whole world (or anything broader).
    #[serde(other)]
    World,
}

impl ScopeKind {
    /// Whether this kind receives the implicit visibility buffer when no
    /// explicit buffer distance is configured.
    pub const fn has_implicit_buffer(self) -> bool {
        matches!(self, Self::Location | Self::Region)
    }

    /// Stable lowercase name, used in store keys and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Group => "group",
            Self::Location => "location",
            Self::Region => "region",
            Self::World => "world",
        }
    }
}

impl core::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One buffered event reference: what happened and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The event's id.
    pub event_id: EventId,
    /// The event's timestamp in unix milliseconds.
    pub timestamp_ms: i64,
}

/// The narrator agent bound to a single scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeAgent {
    /// Unique key among live agents.
    pub scope_id: ScopeId,
    /// What kind of scope this agent narrates.
    pub kind: ScopeKind,
    /// The world the scope belongs to.
    pub world_id: WorldId,
    /// Entities whose context is gathered for narration, in priority
    /// order. The first entry is the primary entity whose geometry
    /// anchors the visibility region.
    pub focus_entities: Vec<EntityId>,
    /// The primary entity's geometry as fetched at creation time.
    /// Cached so visibility can be recomputed on projection changes
    /// without another provider round-trip.
    #[serde(default)]
    pub primary_geometry: Geometry,
    /// The computed region of interest.
    pub visibility: Region,
    /// Free-form mutable state bag. Carried narrative mood lives under
    /// [`ScopeAgent::MOOD_KEY`].
    #[serde(default)]
    pub state: BTreeMap<String, serde_json::Value>,
    /// Projected entity snapshot data, namespaced by entity id so
    /// multiple focus entities cannot collide. Kept separate from the
    /// tunable profile on purpose.
    #[serde(default)]
    pub entity_state: BTreeMap<EntityId, BTreeMap<String, serde_json::Value>>,
    /// Append-ordered references to buffered events. Append-only except
    /// for overflow truncation.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Resolved configuration (kind profile merged with scope override).
    pub profile: Profile,
    /// Registry generation at creation time. An expiry timer only fires
    /// if the live agent still carries the same generation.
    #[serde(default)]
    pub generation: u64,
    /// Logical clock value (unix ms) of the last batch processing, or
    /// `None` if the agent has never been processed.
    #[serde(default)]
    pub last_processed_ms: Option<i64>,
    /// Creation timestamp in unix milliseconds.
    pub created_at_ms: i64,
}

impl ScopeAgent {
    /// State-bag key under which carried narrative mood is stored.
    pub const MOOD_KEY: &'static str = "mood";

    /// The primary focus entity, when one exists.
    pub fn primary_focus(&self) -> Option<&EntityId> {
        self.focus_entities.first()
    }

    /// The carried narrative mood, if any was stored by a prior
    /// narration.
    pub fn mood(&self) -> Vec<String> {
        self.state
            .get(Self::MOOD_KEY)
            .and_then(|v| v.as_array())
            .map(|moods| {
                moods
                    .iter()
                    .filter_map(|m| m.as_str().map(ToOwned::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Read a numeric attribute from the primary focus entity's
    /// projected state (e.g. `"perception"`).
    pub fn primary_entity_attr(&self, key: &str) -> Option<f64> {
        let entity = self.primary_focus()?;
        self.entity_state
            .get(entity)
            .and_then(|slot| slot.get(key))
            .and_then(serde_json::Value::as_f64)
    }

    /// Timestamp of the most recent history entry, if any.
    pub fn last_event_ms(&self) -> Option<i64> {
        self.history.last().map(|h| h.timestamp_ms)
    }
}
