//! The live set of scope agents.
//!
//! Agents are shared, long-lived, mutable state touched from three
//! directions: the event-delivery path, the periodic scheduler tick,
//! and detached narration pipelines. One read/write lock serializes
//! everything -- structural changes and per-agent field mutation alike
//! -- so no path ever observes a half-updated agent. Lookups and the
//! scheduling snapshot take the shared side of the lock.
//!
//! Expiry timers race both explicit deletion and re-creation under the
//! same scope id. Deletion is idempotent, and a per-registry generation
//! counter lets a stale timer recognize that the agent it armed for has
//! already been replaced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chronicle_core::compute_visibility;
use chronicle_types::{HistoryEntry, ScopeAgent, ScopeId, StateChange, StateOp};
use tokio::sync::RwLock;
use tracing::debug;

/// Attribute key the visibility recompute reads from the primary
/// entity's projection.
const PERCEPTION_KEY: &str = "perception";

/// Result of appending an event reference to an agent's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// History length after the append (and any eviction).
    pub history_len: usize,
    /// Number of entries evicted from the front.
    pub evicted: usize,
    /// Whether the append brought history exactly to the batch
    /// threshold, so the caller must dispatch a batch narration.
    pub threshold_hit: bool,
}

/// One row of the scheduler's stable snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// The agent's scope id.
    pub scope_id: ScopeId,
    /// Logical clock value of the last batch processing.
    pub last_processed_ms: Option<i64>,
    /// The agent's trigger interval.
    pub trigger_interval_ms: u64,
}

/// The registry of live scope agents.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    agents: RwLock<HashMap<ScopeId, ScopeAgent>>,
    generation: AtomicU64,
}

impl ScopeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next generation number for an agent about to be
    /// inserted.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Insert an agent, overwriting any prior live agent under the same
    /// scope id.
    pub async fn insert(&self, agent: ScopeAgent) {
        let mut agents = self.agents.write().await;
        let replaced = agents.insert(agent.scope_id.clone(), agent);
        if let Some(old) = replaced {
            debug!(scope_id = %old.scope_id, "replaced existing scope agent");
        }
    }

    /// Remove an agent. Idempotent: removing a missing agent is a
    /// no-op returning `false`.
    pub async fn remove(&self, scope_id: &ScopeId) -> bool {
        self.agents.write().await.remove(scope_id).is_some()
    }

    /// Remove an agent only if it still carries `generation`.
    ///
    /// Used by expiry timers so a timer armed for a replaced agent
    /// cannot delete its successor.
    pub async fn remove_if_generation(&self, scope_id: &ScopeId, generation: u64) -> bool {
        let mut agents = self.agents.write().await;
        let matches = agents.get(scope_id).is_some_and(|a| a.generation == generation);
        if matches {
            agents.remove(scope_id);
        }
        matches
    }

    /// Clone an agent out of the registry.
    pub async fn get(&self, scope_id: &ScopeId) -> Option<ScopeAgent> {
        self.agents.read().await.get(scope_id).cloned()
    }

    /// Number of live agents.
    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    /// Whether no agents are live.
    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// A stable snapshot of the scheduling fields of every live agent.
    ///
    /// Safe against concurrent mutation: the scheduler iterates the
    /// returned list, not the map.
    pub async fn schedule_snapshot(&self) -> Vec<ScheduleEntry> {
        self.agents
            .read()
            .await
            .values()
            .map(|a| ScheduleEntry {
                scope_id: a.scope_id.clone(),
                last_processed_ms: a.last_processed_ms,
                trigger_interval_ms: a.profile.trigger_interval_ms,
            })
            .collect()
    }

    /// Append an event reference to an agent's history, evicting the
    /// oldest entries beyond the buffer limit when eviction is enabled.
    ///
    /// Returns `None` when no agent is live under the scope id.
    pub async fn append_history(
        &self,
        scope_id: &ScopeId,
        entry: HistoryEntry,
    ) -> Option<AppendOutcome> {
        let mut agents = self.agents.write().await;
        let agent = agents.get_mut(scope_id)?;

        agent.history.push(entry);

        let limit = agent.profile.buffer_limit as usize;
        let mut evicted = 0;
        if agent.profile.evict_overflow && limit > 0 && agent.history.len() > limit {
            evicted = agent.history.len().saturating_sub(limit);
            agent.history.drain(..evicted);
        }

        let history_len = agent.history.len();
        let max_events = agent.profile.max_events as usize;
        Some(AppendOutcome {
            history_len,
            evicted,
            threshold_hit: max_events > 0 && history_len == max_events,
        })
    }

    /// Apply projection operations from a domain event to an agent.
    ///
    /// Only changes addressed at one of the agent's focus entities are
    /// applied, each into that entity's namespaced slot. Any applied
    /// change recomputes the visibility region. Never touches history.
    ///
    /// Returns whether at least one change was applied.
    pub async fn apply_state_changes(
        &self,
        scope_id: &ScopeId,
        changes: &[StateChange],
    ) -> bool {
        let mut agents = self.agents.write().await;
        let Some(agent) = agents.get_mut(scope_id) else {
            return false;
        };

        let mut applied = false;
        for change in changes {
            if !agent.focus_entities.contains(&change.entity_id) {
                continue;
            }
            let slot = agent.entity_state.entry(change.entity_id.clone()).or_default();
            for op in &change.ops {
                apply_op(slot, op);
            }
            applied = true;
        }

        if applied {
            let perception = agent.primary_entity_attr(PERCEPTION_KEY);
            agent.visibility = compute_visibility(
                agent.kind,
                &agent.primary_geometry,
                perception,
                agent.profile.visibility_buffer,
            );
            debug!(scope_id = %scope_id, "entity projection applied, visibility recomputed");
        }
        applied
    }

    /// Store a narration's mood list in an agent's state bag.
    pub async fn set_mood(&self, scope_id: &ScopeId, mood: &[String]) -> bool {
        let mut agents = self.agents.write().await;
        let Some(agent) = agents.get_mut(scope_id) else {
            return false;
        };
        agent
            .state
            .insert(ScopeAgent::MOOD_KEY.to_owned(), serde_json::json!(mood));
        true
    }

    /// Record that an agent was dispatched for batch processing at the
    /// given logical clock value.
    pub async fn mark_processed(&self, scope_id: &ScopeId, now_ms: i64) -> bool {
        let mut agents = self.agents.write().await;
        let Some(agent) = agents.get_mut(scope_id) else {
            return false;
        };
        agent.last_processed_ms = Some(now_ms);
        true
    }
}

/// Apply one projection operation to an entity's slot.
fn apply_op(slot: &mut std::collections::BTreeMap<String, serde_json::Value>, op: &StateOp) {
    match op {
        StateOp::Set { key, value } => {
            slot.insert(key.clone(), value.clone());
        }
        StateOp::AppendToSet { key, value } => match slot.get_mut(key) {
            Some(serde_json::Value::Array(items)) => {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
            _ => {
                slot.insert(key.clone(), serde_json::json!([value]));
            }
        },
        StateOp::RemoveFromSet { key, value } => {
            if let Some(serde_json::Value::Array(items)) = slot.get_mut(key) {
                items.retain(|item| item != value);
            }
        }
        StateOp::RemoveField { key } => {
            slot.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chronicle_types::{
        EntityId, EventId, Geometry, Point, Profile, Region, ScopeKind, WorldId,
    };

    use super::*;

    fn test_agent(scope: &str, profile: Profile) -> ScopeAgent {
        ScopeAgent {
            scope_id: ScopeId::new(scope),
            kind: ScopeKind::Player,
            world_id: WorldId::new("w1"),
            focus_entities: vec![EntityId::new("player:7")],
            primary_geometry: Geometry::Circle {
                center: Point::new(0.0, 0.0),
                radius: 10.0,
            },
            visibility: Region::Circle { center: Point::default(), radius: 200.0 },
            state: BTreeMap::new(),
            entity_state: BTreeMap::new(),
            history: Vec::new(),
            profile,
            generation: 0,
            last_processed_ms: None,
            created_at_ms: 0,
        }
    }

    fn entry(id: &str, ts: i64) -> HistoryEntry {
        HistoryEntry { event_id: EventId::new(id), timestamp_ms: ts }
    }

    #[tokio::test]
    async fn insert_overwrites_same_scope_id() {
        let registry = ScopeRegistry::new();
        let mut first = test_agent("s1", Profile::default());
        first.generation = registry.next_generation();
        registry.insert(first).await;

        let mut second = test_agent("s1", Profile::default());
        second.generation = registry.next_generation();
        let gen2 = second.generation;
        registry.insert(second).await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(&ScopeId::new("s1")).await.map(|a| a.generation), Some(gen2));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = ScopeRegistry::new();
        registry.insert(test_agent("s1", Profile::default())).await;
        assert!(registry.remove(&ScopeId::new("s1")).await);
        assert!(!registry.remove(&ScopeId::new("s1")).await);
    }

    #[tokio::test]
    async fn stale_generation_cannot_remove() {
        let registry = ScopeRegistry::new();
        let mut old = test_agent("s1", Profile::default());
        old.generation = registry.next_generation();
        let old_gen = old.generation;
        registry.insert(old).await;

        // Re-create under the same id with a fresh generation.
        let mut new = test_agent("s1", Profile::default());
        new.generation = registry.next_generation();
        registry.insert(new).await;

        // The stale timer must not delete the replacement.
        assert!(!registry.remove_if_generation(&ScopeId::new("s1"), old_gen).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn overflow_evicts_oldest_down_to_limit() {
        let registry = ScopeRegistry::new();
        let profile = Profile {
            buffer_limit: 100,
            evict_overflow: true,
            max_events: 0,
            ..Profile::default()
        };
        registry.insert(test_agent("s1", profile)).await;
        let id = ScopeId::new("s1");

        for i in 0..150_i64 {
            registry.append_history(&id, entry(&format!("e{i}"), i)).await;
        }

        let agent = registry.get(&id).await.unwrap_or_else(|| test_agent("x", Profile::default()));
        assert_eq!(agent.history.len(), 100);
        // Oldest-first: the most recent 100 survive.
        assert_eq!(agent.history.first().map(|h| h.event_id.as_str()), Some("e50"));
        assert_eq!(agent.history.last().map(|h| h.event_id.as_str()), Some("e149"));
    }

    #[tokio::test]
    async fn eviction_disabled_keeps_everything() {
        let registry = ScopeRegistry::new();
        let profile = Profile {
            buffer_limit: 10,
            evict_overflow: false,
            max_events: 0,
            ..Profile::default()
        };
        registry.insert(test_agent("s1", profile)).await;
        let id = ScopeId::new("s1");

        for i in 0..20_i64 {
            registry.append_history(&id, entry(&format!("e{i}"), i)).await;
        }
        let agent = registry.get(&id).await.unwrap_or_else(|| test_agent("x", Profile::default()));
        assert_eq!(agent.history.len(), 20);
    }

    #[tokio::test]
    async fn threshold_hit_exactly_at_max_events() {
        let registry = ScopeRegistry::new();
        let profile = Profile { max_events: 50, ..Profile::default() };
        registry.insert(test_agent("s1", profile)).await;
        let id = ScopeId::new("s1");

        let mut dispatches = 0;
        for i in 0..60_i64 {
            let outcome = registry.append_history(&id, entry(&format!("e{i}"), i)).await;
            if outcome.is_some_and(|o| o.threshold_hit) {
                dispatches += 1;
                assert_eq!(i, 49, "the 50th append hits the threshold");
            }
        }
        assert_eq!(dispatches, 1, "only the 50th append dispatches");
    }

    #[tokio::test]
    async fn state_changes_project_and_recompute_visibility() {
        let registry = ScopeRegistry::new();
        registry.insert(test_agent("s1", Profile::default())).await;
        let id = ScopeId::new("s1");

        let changes = vec![StateChange {
            entity_id: EntityId::new("player:7"),
            ops: vec![StateOp::Set {
                key: "perception".to_owned(),
                value: serde_json::json!(0.5),
            }],
        }];
        assert!(registry.apply_state_changes(&id, &changes).await);

        let agent = registry.get(&id).await.unwrap_or_else(|| test_agent("x", Profile::default()));
        // Player radius 200 scaled by perception 0.5.
        match agent.visibility {
            Region::Circle { radius, .. } => assert!((radius - 100.0).abs() < 1e-9),
            Region::Rect { .. } | Region::Unbounded => {}
        }
        // Projection never touches history.
        assert!(agent.history.is_empty());
    }

    #[tokio::test]
    async fn state_changes_ignore_non_focus_entities() {
        let registry = ScopeRegistry::new();
        registry.insert(test_agent("s1", Profile::default())).await;
        let id = ScopeId::new("s1");

        let changes = vec![StateChange {
            entity_id: EntityId::new("npc:stranger"),
            ops: vec![StateOp::Set { key: "perception".to_owned(), value: serde_json::json!(2.0) }],
        }];
        assert!(!registry.apply_state_changes(&id, &changes).await);
    }

    #[tokio::test]
    async fn set_ops_compose_on_one_slot() {
        let registry = ScopeRegistry::new();
        registry.insert(test_agent("s1", Profile::default())).await;
        let id = ScopeId::new("s1");
        let entity = EntityId::new("player:7");

        let ops = vec![
            StateOp::AppendToSet { key: "tags".to_owned(), value: serde_json::json!("wounded") },
            StateOp::AppendToSet { key: "tags".to_owned(), value: serde_json::json!("hunted") },
            StateOp::AppendToSet { key: "tags".to_owned(), value: serde_json::json!("wounded") },
            StateOp::RemoveFromSet { key: "tags".to_owned(), value: serde_json::json!("hunted") },
        ];
        registry
            .apply_state_changes(&id, &[StateChange { entity_id: entity.clone(), ops }])
            .await;

        let agent = registry.get(&id).await.unwrap_or_else(|| test_agent("x", Profile::default()));
        let tags = agent
            .entity_state
            .get(&entity)
            .and_then(|slot| slot.get("tags"))
            .cloned()
            .unwrap_or_default();
        assert_eq!(tags, serde_json::json!(["wounded"]));
    }

    #[tokio::test]
    async fn schedule_snapshot_is_stable_clone() {
        let registry = ScopeRegistry::new();
        registry.insert(test_agent("s1", Profile::default())).await;
        registry.insert(test_agent("s2", Profile::default())).await;

        let snapshot = registry.schedule_snapshot().await;
        assert_eq!(snapshot.len(), 2);

        // Mutating the registry does not disturb the snapshot.
        registry.remove(&ScopeId::new("s1")).await;
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn mark_processed_updates_clock() {
        let registry = ScopeRegistry::new();
        registry.insert(test_agent("s1", Profile::default())).await;
        let id = ScopeId::new("s1");

        assert!(registry.mark_processed(&id, 5_000).await);
        let agent = registry.get(&id).await.unwrap_or_else(|| test_agent("x", Profile::default()));
        assert_eq!(agent.last_processed_ms, Some(5_000));
    }
}
