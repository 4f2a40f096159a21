//! Wire-level event types consumed from and published to the bus.
//!
//! A [`WorldEvent`] is immutable once emitted: the engine routes it,
//! buffers a reference to it, or projects its `state_changes`, but never
//! rewrites it. Control events (scope lifecycle, clock ticks) share the
//! same envelope and are distinguished by [`ControlKind`].

use serde::{Deserialize, Serialize};

use crate::keys::{EntityId, EventId, ScopeId, WorldId};

/// An immutable event flowing through the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// Free-form event type (`"combat_started"`, `"scope_created"`, ...).
    pub event_type: String,
    /// Event timestamp in unix milliseconds.
    pub timestamp_ms: i64,
    /// Producer of the event (service or entity name).
    pub source: String,
    /// The world this event happened in.
    pub world_id: WorldId,
    /// Target scope, when the producer addressed one.
    #[serde(default)]
    pub scope_id: Option<ScopeId>,
    /// Free-form event payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Entity-state projection operations carried by this event.
    #[serde(default)]
    pub state_changes: Option<Vec<StateChange>>,
}

impl WorldEvent {
    /// Interpret this event as a control event, if its type matches one
    /// of the lifecycle or clock operations.
    pub fn control_kind(&self) -> Option<ControlKind> {
        ControlKind::from_type(&self.event_type)
    }

    /// Read `current_time_unix_ms` from a clock-tick payload.
    ///
    /// Returns `None` when the field is absent or not an integer.
    pub fn clock_ms(&self) -> Option<i64> {
        self.payload.get("current_time_unix_ms").and_then(serde_json::Value::as_i64)
    }
}

/// The control operations the engine reacts to on the control subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Create (or recreate) a scope agent.
    ScopeCreated,
    /// Delete a scope agent.
    ScopeDeleted,
    /// Merge two scopes. Named hook only -- logged, not implemented.
    ScopeMerged,
    /// Split a scope. Named hook only -- logged, not implemented.
    ScopeSplit,
    /// Periodic logical clock tick carrying `current_time_unix_ms`.
    ClockTick,
}

impl ControlKind {
    /// Map an event type string onto a control kind.
    pub fn from_type(event_type: &str) -> Option<Self> {
        match event_type {
            "scope_created" => Some(Self::ScopeCreated),
            "scope_deleted" => Some(Self::ScopeDeleted),
            "scope_merged" => Some(Self::ScopeMerged),
            "scope_split" => Some(Self::ScopeSplit),
            "clock_tick" => Some(Self::ClockTick),
            _ => None,
        }
    }
}

/// Entity-state projection carried by a domain event.
///
/// Producers describe how an entity changed as an ordered list of
/// operations; the engine applies them to the per-entity projection slot
/// of every agent that lists the entity among its focus entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// The entity whose projected state changed.
    pub entity_id: EntityId,
    /// Operations to apply, in order.
    pub ops: Vec<StateOp>,
}

/// A single projection operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StateOp {
    /// Set a field to a value, replacing any previous value.
    Set {
        /// Field name.
        key: String,
        /// New value.
        value: serde_json::Value,
    },
    /// Append a value to a set-valued field (no duplicates).
    AppendToSet {
        /// Field name.
        key: String,
        /// Value to add.
        value: serde_json::Value,
    },
    /// Remove a value from a set-valued field.
    RemoveFromSet {
        /// Field name.
        key: String,
        /// Value to remove.
        value: serde_json::Value,
    },
    /// Remove a field entirely.
    RemoveField {
        /// Field name.
        key: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_kind_mapping() {
        assert_eq!(ControlKind::from_type("scope_created"), Some(ControlKind::ScopeCreated));
        assert_eq!(ControlKind::from_type("clock_tick"), Some(ControlKind::ClockTick));
        assert_eq!(ControlKind::from_type("combat_started"), None);
    }

    #[test]
    fn clock_ms_reads_payload() {
        let event = WorldEvent {
            id: EventId::new("e1"),
            event_type: "clock_tick".to_owned(),
            timestamp_ms: 0,
            source: "clock".to_owned(),
            world_id: WorldId::new("w1"),
            scope_id: None,
            payload: serde_json::json!({"current_time_unix_ms": 1_700_000_000_000_i64}),
            state_changes: None,
        };
        assert_eq!(event.clock_ms(), Some(1_700_000_000_000));
    }

    #[test]
    fn state_op_wire_format() {
        let op = StateOp::Set {
            key: "perception".to_owned(),
            value: serde_json::json!(0.5),
        };
        let json = serde_json::to_value(&op).unwrap_or_default();
        assert_eq!(json.get("op").and_then(serde_json::Value::as_str), Some("set"));

        let raw = serde_json::json!({"op": "remove_field", "key": "mood"});
        let parsed: Result<StateOp, _> = serde_json::from_value(raw);
        assert_eq!(parsed.ok(), Some(StateOp::RemoveField { key: "mood".to_owned() }));
    }

    #[test]
    fn event_defaults_tolerate_sparse_payloads() {
        let raw = serde_json::json!({
            "id": "e9",
            "event_type": "door_opened",
            "timestamp_ms": 12,
            "source": "world",
            "world_id": "w1"
        });
        let event: Result<WorldEvent, _> = serde_json::from_value(raw);
        let event = match event {
            Ok(e) => e,
            Err(_) => return,
        };
        assert_eq!(event.scope_id, None);
        assert!(event.state_changes.is_none());
        assert!(event.payload.is_null());
    }
}
