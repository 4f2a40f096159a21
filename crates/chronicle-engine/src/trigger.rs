//! Per-event policy: immediate reaction, projection, buffering, or
//! threshold dispatch.
//!
//! Every domain event with a scope id lands here. Events carrying a
//! projection for one of the agent's focus entities update the entity
//! snapshot and never touch history. Narrative-trigger types dispatch
//! narration immediately without buffering. Everything else is buffered,
//! with oldest-first eviction beyond the configured limit, and a batch
//! narration fires the moment history reaches the max-events threshold.

use std::sync::Arc;

use chronicle_types::{HistoryEntry, WorldEvent};
use tracing::debug;

use crate::engine::Engine;
use crate::narration::NarrationReason;

/// Handle one domain event.
pub async fn on_domain_event(engine: &Arc<Engine>, event: WorldEvent) {
    let Some(scope_id) = event.scope_id.clone() else {
        debug!(event_type = event.event_type, "domain event without scope id, dropping");
        return;
    };

    let Some(agent) = engine.registry.get(&scope_id).await else {
        debug!(
            scope_id = %scope_id,
            event_type = event.event_type,
            "no live agent for scope, dropping event"
        );
        return;
    };

    // Projection events update the entity snapshot and recompute
    // visibility; they are not narrative material themselves.
    if let Some(changes) = &event.state_changes {
        let addressed = changes.iter().any(|c| agent.focus_entities.contains(&c.entity_id));
        if addressed {
            engine.registry.apply_state_changes(&scope_id, changes).await;
            return;
        }
    }

    // Narrative triggers react immediately and are not buffered here;
    // the pipeline itself appends the triggering event.
    if agent.profile.is_trigger(&event.event_type) {
        debug!(
            scope_id = %scope_id,
            event_type = event.event_type,
            "narrative trigger, dispatching immediate narration"
        );
        engine.spawn_narration(&scope_id, NarrationReason::Trigger(Box::new(event)));
        return;
    }

    let entry = HistoryEntry {
        event_id: event.id.clone(),
        timestamp_ms: event.timestamp_ms,
    };
    let outcome = engine.registry.append_history(&scope_id, entry).await;

    if let Some(outcome) = outcome {
        if outcome.evicted > 0 {
            debug!(
                scope_id = %scope_id,
                evicted = outcome.evicted,
                history_len = outcome.history_len,
                "history overflow, evicted oldest entries"
            );
        }
        if outcome.threshold_hit {
            debug!(
                scope_id = %scope_id,
                history_len = outcome.history_len,
                "max-events threshold reached, dispatching batch narration"
            );
            engine.spawn_narration(
                &scope_id,
                NarrationReason::BufferFull { now_ms: event.timestamp_ms },
            );
        }
    }
}
