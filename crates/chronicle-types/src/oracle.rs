//! The generation-service ("oracle") reply shape.
//!
//! The oracle takes structured narrative context and returns prose plus
//! up to [`MAX_CANDIDATE_EVENTS`] follow-up events the narrator wants to
//! inject back into the world. The reply is the only thing the engine
//! trusts from the oracle; anything malformed fails the invocation.

use serde::{Deserialize, Serialize};

use crate::keys::{ScopeId, WorldId};

/// Upper bound on follow-up events accepted from a single oracle reply.
pub const MAX_CANDIDATE_EVENTS: usize = 3;

/// A parsed oracle reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleReply {
    /// The narrative continuation. Must be non-empty.
    pub narrative: String,
    /// Mood descriptors carried into the agent's state for future
    /// time-context descriptions.
    #[serde(default)]
    pub mood: Vec<String>,
    /// Candidate follow-up events, capped at [`MAX_CANDIDATE_EVENTS`].
    #[serde(default)]
    pub new_events: Vec<CandidateEvent>,
}

/// A follow-up event proposed by the oracle.
///
/// World and scope ids are optional on the wire: the pipeline stamps
/// them with the owning agent's ids before publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    /// Event type for the emitted event.
    pub event_type: String,
    /// Timestamp in unix milliseconds; the pipeline fills it when absent.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Producer label.
    #[serde(default)]
    pub source: Option<String>,
    /// World id as proposed by the oracle (overridden by the agent's).
    #[serde(default)]
    pub world_id: Option<WorldId>,
    /// Scope id as proposed by the oracle (overridden by the agent's).
    #[serde(default)]
    pub scope_id: Option<ScopeId>,
    /// Free-form payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_tolerates_missing_optionals() {
        let raw = serde_json::json!({"narrative": "The square falls quiet."});
        let reply: Result<OracleReply, _> = serde_json::from_value(raw);
        let reply = match reply {
            Ok(r) => r,
            Err(_) => return,
        };
        assert!(reply.mood.is_empty());
        assert!(reply.new_events.is_empty());
    }

    #[test]
    fn candidate_event_roundtrip() {
        let raw = serde_json::json!({
            "event_type": "rumor_spreads",
            "payload": {"topic": "the stranger"}
        });
        let event: Result<CandidateEvent, _> = serde_json::from_value(raw);
        let event = match event {
            Ok(e) => e,
            Err(_) => return,
        };
        assert_eq!(event.event_type, "rumor_spreads");
        assert_eq!(event.world_id, None);
    }
}
