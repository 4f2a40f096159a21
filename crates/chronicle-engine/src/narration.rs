//! The narration pipeline: from accumulated events to published prose.
//!
//! Invoked in three ways: immediately on a narrative-trigger event, on
//! the max-events buffer threshold, or on a scheduler tick. The steps:
//! append the triggering event (non-synthetic invocations only), select
//! the event set, gather semantic context, cluster the events, describe
//! the time and mood, call the oracle, store the returned mood, publish
//! the candidate events, and persist a snapshot.
//!
//! Any oracle failure -- transport, timeout, malformed reply, empty
//! narrative -- abandons the remaining steps with a warning. Nothing is
//! retried here and no error reaches the producer of the triggering
//! event; the cycle simply produced no output.

use std::sync::Arc;

use chronicle_core::{cluster_events, TimeContext};
use chronicle_oracle::parse_oracle_reply;
use chronicle_oracle::prompt::{ClusterLine, EntityContext, NarrationContext};
use chronicle_types::{EventId, HistoryEntry, WorldEvent};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::engine::Engine;

/// Why a narration pipeline was dispatched.
#[derive(Debug)]
pub enum NarrationReason {
    /// A narrative-trigger event demands an immediate reaction.
    Trigger(Box<WorldEvent>),
    /// History reached the max-events threshold.
    BufferFull {
        /// Logical clock value at dispatch (the threshold event's
        /// timestamp).
        now_ms: i64,
    },
    /// The scheduler found the agent due on a clock tick.
    TimeTick {
        /// The tick's logical clock value.
        now_ms: i64,
    },
}

impl NarrationReason {
    /// Short label for log fields.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Trigger(_) => "trigger",
            Self::BufferFull { .. } => "buffer_full",
            Self::TimeTick { .. } => "time_tick",
        }
    }

    /// The logical clock value of this invocation.
    pub fn now_ms(&self) -> i64 {
        match self {
            Self::Trigger(event) => event.timestamp_ms,
            Self::BufferFull { now_ms } | Self::TimeTick { now_ms } => *now_ms,
        }
    }
}

/// Run one narration cycle for a scope.
pub async fn run(engine: Arc<Engine>, scope_id: chronicle_types::ScopeId, reason: NarrationReason) {
    let now_ms = reason.now_ms();

    // Step 1: non-synthetic invocations append the triggering event.
    if let NarrationReason::Trigger(event) = &reason {
        let entry = HistoryEntry {
            event_id: event.id.clone(),
            timestamp_ms: event.timestamp_ms,
        };
        if engine.registry.append_history(&scope_id, entry).await.is_none() {
            debug!(scope_id = %scope_id, "agent vanished before narration, aborting");
            return;
        }
    }

    let Some(agent) = engine.registry.get(&scope_id).await else {
        debug!(scope_id = %scope_id, "agent vanished before narration, aborting");
        return;
    };

    // Step 2: the event set to summarize -- the single triggering event,
    // or the whole current history for batch/tick invocations.
    let selected: Vec<HistoryEntry> = match &reason {
        NarrationReason::Trigger(event) => vec![HistoryEntry {
            event_id: event.id.clone(),
            timestamp_ms: event.timestamp_ms,
        }],
        NarrationReason::BufferFull { .. } | NarrationReason::TimeTick { .. } => {
            agent.history.clone()
        }
    };

    // Step 3: world and per-focus-entity context.
    let world_entity = Engine::world_entity(&agent.world_id);
    let mut lookup = vec![world_entity.clone()];
    lookup.extend(agent.focus_entities.iter().cloned());
    let event_types = match &reason {
        NarrationReason::Trigger(event) => vec![event.event_type.clone()],
        NarrationReason::BufferFull { .. } | NarrationReason::TimeTick { .. } => Vec::new(),
    };
    let contexts = engine
        .semantic
        .context_with_events(&lookup, &event_types, engine.context_depth)
        .await;

    // Step 4: cluster the selected events into human-scale windows.
    let clusters: Vec<ClusterLine> = cluster_events(&selected)
        .into_iter()
        .map(|c| ClusterLine { label: c.label, description: c.description })
        .collect();

    // Step 5: time-of-day, season, elapsed time, carried mood.
    let time_line = TimeContext::at(now_ms, agent.last_event_ms(), agent.mood()).describe();

    let context = NarrationContext {
        scope_id: agent.scope_id.to_string(),
        scope_kind: agent.kind.as_str().to_owned(),
        world_context: contexts.get(&world_entity).cloned().unwrap_or_default(),
        entity_contexts: agent
            .focus_entities
            .iter()
            .map(|id| EntityContext {
                entity_id: id.to_string(),
                text: contexts.get(id).cloned().unwrap_or_default(),
            })
            .collect(),
        clusters,
        time_line,
    };

    // Step 6: the oracle call, bounded by the configured deadline.
    let prompt = match engine.prompts.render(&context) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!(scope_id = %scope_id, error = %e, "prompt render failed, abandoning narration");
            return;
        }
    };
    let raw = match timeout(engine.oracle_timeout, engine.oracle.complete(&prompt)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            warn!(
                scope_id = %scope_id,
                reason = reason.label(),
                error = %e,
                "oracle call failed, abandoning narration"
            );
            return;
        }
        Err(_) => {
            warn!(
                scope_id = %scope_id,
                reason = reason.label(),
                timeout_ms = u64::try_from(engine.oracle_timeout.as_millis()).unwrap_or(u64::MAX),
                "oracle deadline exceeded, abandoning narration"
            );
            return;
        }
    };
    let reply = match parse_oracle_reply(&raw) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(
                scope_id = %scope_id,
                reason = reason.label(),
                error = %e,
                "oracle reply rejected, abandoning narration"
            );
            return;
        }
    };

    info!(
        scope_id = %scope_id,
        reason = reason.label(),
        events_summarized = selected.len(),
        narrative_len = reply.narrative.len(),
        candidate_events = reply.new_events.len(),
        "narration produced"
    );

    // Step 7: carry the mood for future time-context descriptions.
    if !reply.mood.is_empty() {
        engine.registry.set_mood(&scope_id, &reply.mood).await;
    }

    // Step 8: publish candidate events, stamped with the agent's ids.
    for candidate in reply.new_events {
        let event = WorldEvent {
            id: EventId::generate(),
            event_type: candidate.event_type,
            timestamp_ms: candidate.timestamp.unwrap_or(now_ms),
            source: candidate.source.unwrap_or_else(|| "chronicle".to_owned()),
            world_id: agent.world_id.clone(),
            scope_id: Some(agent.scope_id.clone()),
            payload: candidate.payload,
            state_changes: None,
        };
        if let Err(e) = engine.bus.publish_world_event(&event).await {
            warn!(scope_id = %scope_id, error = %e, "failed to publish candidate event");
        }
    }

    // Step 9: persist a snapshot of the (possibly mood-updated) agent.
    let snapshot_agent = engine.registry.get(&scope_id).await.unwrap_or(agent);
    match engine.snapshots.save(&snapshot_agent, now_ms).await {
        Ok(key) => {
            debug!(scope_id = %scope_id, key = key, "snapshot persisted");
            if let Err(e) = engine
                .snapshots
                .prune(&snapshot_agent.profile.snapshot_namespace, &scope_id, engine.snapshot_keep)
                .await
            {
                warn!(scope_id = %scope_id, error = %e, "snapshot prune failed");
            }
        }
        Err(e) => {
            warn!(scope_id = %scope_id, error = %e, "snapshot save failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use chronicle_oracle::{OracleBackend, PromptEngine};
    use chronicle_store::{MemoryStore, ObjectStore, ProfileStore, SnapshotStore};
    use chronicle_types::{EntityId, Geometry, Point, Profile, ScopeId, WorldId};

    use crate::bus::{Bus, MemoryBus};
    use crate::context::{GeometryProvider, SemanticProvider};
    use crate::trigger;

    use super::*;

    /// Write the narration templates into a unique temp directory.
    fn write_templates() -> std::path::PathBuf {
        let unique = format!(
            "chronicle_engine_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(
            dir.join("system.j2"),
            "You narrate the {{ scope_kind }} scope {{ scope_id }}. Respond with JSON.",
        )
        .ok();
        std::fs::write(
            dir.join("scene.j2"),
            "{{ world_context }}\n{% for e in entity_contexts %}{{ e.entity_id }}: {{ e.text }}\n{% endfor %}",
        )
        .ok();
        std::fs::write(
            dir.join("history.j2"),
            "{% for c in clusters %}[{{ c.label }}] {{ c.description }}\n{% endfor %}{{ time_line }}",
        )
        .ok();
        std::fs::write(dir.join("directive.j2"), "Continue the story as JSON.").ok();
        dir
    }

    /// The canned oracle reply used by the scenario tests.
    fn oracle_reply() -> String {
        serde_json::json!({
            "narrative": "The market holds its breath as the stranger passes.",
            "mood": ["tense"],
            "new_events": [{
                "event_type": "rumor_spreads",
                "payload": {"topic": "the stranger"}
            }]
        })
        .to_string()
    }

    /// Assemble an engine over in-memory collaborators.
    ///
    /// Returns the engine plus handles to the shared object store and
    /// the bus recorder for assertions.
    fn test_engine(oracle_raw: &str) -> (Arc<Engine>, MemoryStore, MemoryBus) {
        let memory = MemoryStore::new();
        let bus = MemoryBus::new();

        let mut geometries = HashMap::new();
        geometries.insert(
            EntityId::new("place:market"),
            Geometry::Circle { center: Point::new(0.0, 0.0), radius: 50.0 },
        );
        let mut texts = HashMap::new();
        texts.insert(EntityId::new("place:market"), "The market square.".to_owned());
        texts.insert(EntityId::new("world:w1"), "A port town.".to_owned());

        let templates = write_templates();
        let prompts = PromptEngine::new(templates.to_str().unwrap_or(""))
            .unwrap_or_else(|e| {
                tracing::error!("failed to load test templates: {e}");
                std::process::exit(1);
            });

        let engine = Engine::new(
            ProfileStore::new(ObjectStore::Memory(memory.clone())),
            SnapshotStore::new(ObjectStore::Memory(memory.clone())),
            GeometryProvider::fixed(geometries),
            SemanticProvider::fixed(texts),
            Bus::Memory(bus.clone()),
            prompts,
            OracleBackend::fixed(oracle_raw.to_owned()),
            Duration::from_secs(5),
            2,
            5,
        );
        (Arc::new(engine), memory, bus)
    }

    /// A `scope_created` control event for a location scope.
    fn create_event(scope: &str, ts: i64) -> WorldEvent {
        WorldEvent {
            id: EventId::generate(),
            event_type: "scope_created".to_owned(),
            timestamp_ms: ts,
            source: "test".to_owned(),
            world_id: WorldId::new("w1"),
            scope_id: Some(ScopeId::new(scope)),
            payload: serde_json::json!({
                "scope_type": "location",
                "focus_entities": ["place:market"]
            }),
            state_changes: None,
        }
    }

    /// A plain domain event addressed at a scope.
    fn domain_event(scope: &str, event_type: &str, ts: i64) -> WorldEvent {
        WorldEvent {
            id: EventId::generate(),
            event_type: event_type.to_owned(),
            timestamp_ms: ts,
            source: "world".to_owned(),
            world_id: WorldId::new("w1"),
            scope_id: Some(ScopeId::new(scope)),
            payload: serde_json::Value::Null,
            state_changes: None,
        }
    }

    /// Seed a document into the shared memory store.
    async fn seed(memory: &MemoryStore, key: &str, body: &str) {
        ObjectStore::Memory(memory.clone()).put(key, body).await.ok();
    }

    /// Poll the bus until at least `n` events are published.
    async fn wait_for_published(bus: &MemoryBus, n: usize) -> Vec<WorldEvent> {
        for _ in 0..200 {
            let published = bus.published().await;
            if published.len() >= n {
                return published;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        bus.published().await
    }

    #[tokio::test]
    async fn buffer_threshold_runs_pipeline_once() {
        let (engine, memory, bus) = test_engine(&oracle_reply());

        // Profile: 50-event threshold, no narrative triggers.
        let profile = Profile { max_events: 50, ..Profile::default() };
        seed(
            &memory,
            "profiles/location.json",
            &serde_json::to_string(&profile).unwrap_or_default(),
        )
        .await;

        engine.handle_control(&create_event("loc:market", 1_000)).await;
        assert_eq!(engine.registry.len().await, 1);

        // 49 events: nothing published yet.
        for i in 0..49_i64 {
            trigger::on_domain_event(&engine, domain_event("loc:market", "footstep", 2_000 + i)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(bus.published().await.is_empty(), "49th event must not dispatch");

        // The 50th dispatches exactly one batch narration.
        trigger::on_domain_event(&engine, domain_event("loc:market", "footstep", 2_049)).await;
        let published = wait_for_published(&bus, 1).await;
        assert_eq!(published.len(), 1, "exactly one candidate event published");

        let out = published.first().cloned().unwrap_or_else(|| domain_event("x", "x", 0));
        assert_eq!(out.event_type, "rumor_spreads");
        assert_eq!(out.world_id, WorldId::new("w1"));
        assert_eq!(out.scope_id, Some(ScopeId::new("loc:market")));

        // A snapshot revision exists under the agent's hashed path.
        let mut snapshot_keys = memory_keys(&memory, "snapshots/").await;
        for _ in 0..200 {
            if !snapshot_keys.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            snapshot_keys = memory_keys(&memory, "snapshots/").await;
        }
        assert_eq!(snapshot_keys.len(), 1);

        // The stored mood became ["tense"].
        let agent = engine.registry.get(&ScopeId::new("loc:market")).await;
        assert_eq!(agent.map(|a| a.mood()), Some(vec!["tense".to_owned()]));
    }

    #[tokio::test]
    async fn narrative_trigger_reacts_immediately() {
        let (engine, memory, bus) = test_engine(&oracle_reply());
        let profile = Profile {
            narrative_triggers: vec!["player_died".to_owned()],
            ..Profile::default()
        };
        seed(
            &memory,
            "overrides/loc:tavern.json",
            &serde_json::to_string(&profile).unwrap_or_default(),
        )
        .await;

        engine.handle_control(&create_event("loc:tavern", 1_000)).await;

        trigger::on_domain_event(&engine, domain_event("loc:tavern", "player_died", 1_500)).await;
        let published = wait_for_published(&bus, 1).await;
        assert_eq!(published.len(), 1, "immediate narration publishes once");

        // The triggering event was appended to history by the pipeline.
        let agent = engine.registry.get(&ScopeId::new("loc:tavern")).await;
        assert_eq!(agent.map(|a| a.history.len()), Some(1));
    }

    #[tokio::test]
    async fn oracle_failure_aborts_silently() {
        let (engine, memory, bus) = test_engine("this is not json at all");

        engine.handle_control(&create_event("loc:docks", 1_000)).await;

        // Force an immediate narration through a trigger override-free
        // path: a tick dispatch on a never-processed agent.
        engine
            .handle_control(&clock_tick(5_000))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(bus.published().await.is_empty(), "no events on oracle failure");
        assert!(
            memory_keys(&memory, "snapshots/").await.is_empty(),
            "no snapshot on oracle failure"
        );
        // The engine stays live and the agent remains registered.
        assert_eq!(engine.registry.len().await, 1);
    }

    #[tokio::test]
    async fn scheduler_dispatches_due_agents_only() {
        let (engine, _memory, bus) = test_engine(&oracle_reply());

        engine.handle_control(&create_event("loc:market", 1_000)).await;

        // Never processed: first tick dispatches.
        engine.handle_control(&clock_tick(10_000)).await;
        let published = wait_for_published(&bus, 1).await;
        assert_eq!(published.len(), 1);

        // Within the trigger interval (default 60s): not due again.
        engine.handle_control(&clock_tick(20_000)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(bus.published().await.len(), 1);

        // Past the interval: due again.
        engine.handle_control(&clock_tick(80_000)).await;
        let published = wait_for_published(&bus, 2).await;
        assert_eq!(published.len(), 2);
    }

    #[tokio::test]
    async fn recreation_rehydrates_carried_state() {
        let (engine, memory, _bus) = test_engine(&oracle_reply());

        engine.handle_control(&create_event("loc:market", 1_000)).await;
        for i in 0..3_i64 {
            trigger::on_domain_event(&engine, domain_event("loc:market", "footstep", 2_000 + i)).await;
        }

        // A tick narration stores the mood and persists a snapshot.
        engine.handle_control(&clock_tick(5_000)).await;
        for _ in 0..200 {
            if !memory_keys(&memory, "snapshots/").await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Delete, then recreate under the same scope id.
        let mut delete = create_event("loc:market", 8_000);
        delete.event_type = "scope_deleted".to_owned();
        delete.payload = serde_json::Value::Null;
        engine.handle_control(&delete).await;
        assert!(engine.registry.is_empty().await);

        engine.handle_control(&create_event("loc:market", 9_000)).await;
        let agent = engine.registry.get(&ScopeId::new("loc:market")).await;
        let agent = match agent {
            Some(a) => a,
            None => return,
        };

        // Carried: history and mood. Re-derived: creation time.
        assert_eq!(agent.history.len(), 3);
        assert_eq!(agent.mood(), vec!["tense".to_owned()]);
        assert_eq!(agent.created_at_ms, 9_000);
        assert_eq!(agent.kind, chronicle_types::ScopeKind::Location);
    }

    #[tokio::test]
    async fn merge_and_split_hooks_only_log() {
        let (engine, _memory, bus) = test_engine(&oracle_reply());
        let mut event = create_event("loc:market", 1_000);
        event.event_type = "scope_merged".to_owned();
        engine.handle_control(&event).await;
        assert!(engine.registry.is_empty().await);
        assert!(bus.published().await.is_empty());
    }

    /// A `clock_tick` control event.
    fn clock_tick(now_ms: i64) -> WorldEvent {
        WorldEvent {
            id: EventId::generate(),
            event_type: "clock_tick".to_owned(),
            timestamp_ms: now_ms,
            source: "clock".to_owned(),
            world_id: WorldId::new("w1"),
            scope_id: None,
            payload: serde_json::json!({"current_time_unix_ms": now_ms}),
            state_changes: None,
        }
    }

    /// Keys currently in the shared memory store under a prefix.
    async fn memory_keys(memory: &MemoryStore, prefix: &str) -> Vec<String> {
        ObjectStore::Memory(memory.clone())
            .list(prefix)
            .await
            .unwrap_or_default()
    }
}
