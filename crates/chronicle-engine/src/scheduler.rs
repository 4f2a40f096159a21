//! The batch scheduler: a global logical clock fan-out.
//!
//! Driven by periodic `clock_tick` control events carrying
//! `current_time_unix_ms`. Each tick walks a stable snapshot of the
//! live agents and dispatches a batch narration for every agent that is
//! due. Dispatch is a detached task -- the scheduler never blocks on
//! narration latency before evaluating the remaining agents.
//!
//! The engine trusts the event's clock value and never consults the
//! wall clock, so replays and tests are deterministic.

use std::sync::Arc;

use tracing::debug;

use crate::engine::Engine;
use crate::narration::NarrationReason;

/// Evaluate every live agent against the tick's clock value.
///
/// An agent is due when it has never been processed or when
/// `now >= last_processed + trigger_interval`. Due agents are marked
/// processed first, then dispatched concurrently.
pub async fn on_clock_tick(engine: &Arc<Engine>, now_ms: i64) {
    let entries = engine.registry.schedule_snapshot().await;
    debug!(now_ms = now_ms, agents = entries.len(), "clock tick");

    for entry in entries {
        let due = entry.last_processed_ms.is_none_or(|last| {
            let interval = i64::try_from(entry.trigger_interval_ms).unwrap_or(i64::MAX);
            now_ms >= last.saturating_add(interval)
        });
        if !due {
            continue;
        }

        engine.registry.mark_processed(&entry.scope_id, now_ms).await;
        debug!(scope_id = %entry.scope_id, now_ms = now_ms, "agent due, dispatching batch narration");
        engine.spawn_narration(&entry.scope_id, NarrationReason::TimeTick { now_ms });
    }
}
