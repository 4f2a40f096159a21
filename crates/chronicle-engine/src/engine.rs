//! Engine assembly and scope lifecycle.
//!
//! [`Engine`] owns every collaborator the event handlers need: the
//! registry, the stores, the context providers, the bus, and the oracle
//! client. Control events route through [`Engine::handle_control`];
//! scope creation resolves configuration, fetches geometry, attempts
//! snapshot rehydration, arms the expiry timer, and registers the
//! agent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chronicle_core::compute_visibility;
use chronicle_oracle::{OracleBackend, PromptEngine};
use chronicle_store::{ProfileStore, SnapshotStore};
use chronicle_types::{
    ControlKind, EntityId, Geometry, ScopeAgent, ScopeId, ScopeKind, WorldEvent, WorldId,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::bus::Bus;
use crate::context::{GeometryProvider, SemanticProvider};
use crate::narration::NarrationReason;
use crate::registry::ScopeRegistry;
use crate::scheduler;

/// Expiry duration as a multiple of the agent's trigger interval.
const EXPIRY_INTERVALS: u64 = 10;

/// Floor for the expiry duration.
const MIN_EXPIRY_MS: u64 = 60_000;

/// Attribute key read from the primary entity's projection when
/// computing visibility.
const PERCEPTION_KEY: &str = "perception";

/// Everything the event handlers and narration pipelines share.
pub struct Engine {
    /// The live agent set.
    pub(crate) registry: Arc<ScopeRegistry>,
    /// Profile and override configuration.
    pub(crate) profiles: ProfileStore,
    /// Content-addressed agent snapshots.
    pub(crate) snapshots: SnapshotStore,
    /// Geometry collaborator.
    pub(crate) geometry: GeometryProvider,
    /// Semantic-context collaborator.
    pub(crate) semantic: SemanticProvider,
    /// Publishing side of the bus.
    pub(crate) bus: Bus,
    /// Prompt templates.
    pub(crate) prompts: PromptEngine,
    /// Generation-service backend.
    pub(crate) oracle: OracleBackend,
    /// Hard deadline for one oracle call.
    pub(crate) oracle_timeout: Duration,
    /// Relationship depth passed to the semantic provider.
    pub(crate) context_depth: u32,
    /// Snapshot revisions kept per scope.
    pub(crate) snapshot_keep: usize,
}

/// Payload of a `scope_created` control event.
#[derive(Debug, Deserialize)]
struct CreatePayload {
    /// Scope id, when not carried in the envelope.
    #[serde(default)]
    scope_id: Option<ScopeId>,
    /// Scope kind; unknown or absent kinds degrade to `world`.
    #[serde(default)]
    scope_type: Option<ScopeKind>,
    /// Focus entities in priority order.
    #[serde(default)]
    focus_entities: Vec<EntityId>,
}

impl Engine {
    /// Assemble an engine from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profiles: ProfileStore,
        snapshots: SnapshotStore,
        geometry: GeometryProvider,
        semantic: SemanticProvider,
        bus: Bus,
        prompts: PromptEngine,
        oracle: OracleBackend,
        oracle_timeout: Duration,
        context_depth: u32,
        snapshot_keep: usize,
    ) -> Self {
        Self {
            registry: Arc::new(ScopeRegistry::new()),
            profiles,
            snapshots,
            geometry,
            semantic,
            bus,
            prompts,
            oracle,
            oracle_timeout,
            context_depth,
            snapshot_keep,
        }
    }

    /// Route a control event to its handler.
    pub async fn handle_control(self: &Arc<Self>, event: &WorldEvent) {
        match event.control_kind() {
            Some(ControlKind::ScopeCreated) => self.create_scope(event).await,
            Some(ControlKind::ScopeDeleted) => self.delete_scope(event).await,
            Some(ControlKind::ScopeMerged | ControlKind::ScopeSplit) => {
                // Lifecycle hooks without semantics yet; they only log.
                info!(
                    event_type = event.event_type,
                    scope_id = ?event.scope_id,
                    "scope merge/split requested, not implemented"
                );
            }
            Some(ControlKind::ClockTick) => {
                let Some(now_ms) = event.clock_ms() else {
                    warn!("clock_tick event without current_time_unix_ms, ignoring");
                    return;
                };
                scheduler::on_clock_tick(self, now_ms).await;
            }
            None => {
                debug!(event_type = event.event_type, "unknown control event, ignoring");
            }
        }
    }

    /// Create (or recreate) a scope agent from a `scope_created` event.
    ///
    /// Resolves profile and override, fetches the primary entity's
    /// geometry, attempts rehydration from the latest snapshot, arms the
    /// expiry timer, and inserts the agent -- overwriting any prior
    /// agent under the same scope id.
    pub async fn create_scope(self: &Arc<Self>, event: &WorldEvent) {
        let payload: CreatePayload = match serde_json::from_value(event.payload.clone()) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "scope_created payload is malformed, ignoring");
                return;
            }
        };

        let Some(scope_id) = event.scope_id.clone().or(payload.scope_id) else {
            warn!("scope_created without a scope id, ignoring");
            return;
        };
        let kind = payload.scope_type.unwrap_or_else(|| {
            warn!(scope_id = %scope_id, "scope_created without scope_type, treating as world");
            ScopeKind::World
        });

        let now_ms = event.timestamp_ms;
        let profile = self.profiles.resolve(kind, &scope_id, now_ms).await;

        let primary_geometry = match payload.focus_entities.first() {
            Some(entity) => self.geometry.geometry(&event.world_id, entity).await,
            None => Geometry::origin(),
        };

        // Rehydration carries what the scope has lived through; identity
        // and configuration always come from the creating event.
        let carried = match self.snapshots.load(&profile.snapshot_namespace, &scope_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(scope_id = %scope_id, error = %e, "snapshot rehydration failed, starting fresh");
                None
            }
        };
        let rehydrated = carried.is_some();
        let (history, state, entity_state, last_processed_ms) = carried.map_or_else(
            || (Vec::new(), BTreeMap::new(), BTreeMap::new(), None),
            |a| (a.history, a.state, a.entity_state, a.last_processed_ms),
        );

        let mut agent = ScopeAgent {
            scope_id: scope_id.clone(),
            kind,
            world_id: event.world_id.clone(),
            focus_entities: payload.focus_entities,
            primary_geometry,
            visibility: chronicle_types::Region::Unbounded,
            state,
            entity_state,
            history,
            profile,
            generation: self.registry.next_generation(),
            last_processed_ms,
            created_at_ms: now_ms,
        };
        agent.visibility = compute_visibility(
            agent.kind,
            &agent.primary_geometry,
            agent.primary_entity_attr(PERCEPTION_KEY),
            agent.profile.visibility_buffer,
        );

        let generation = agent.generation;
        let expiry = expiry_duration(agent.profile.trigger_interval_ms);
        info!(
            scope_id = %scope_id,
            kind = %kind,
            world_id = %agent.world_id,
            rehydrated = rehydrated,
            expiry_ms = u64::try_from(expiry.as_millis()).unwrap_or(u64::MAX),
            "scope agent created"
        );
        self.registry.insert(agent).await;

        // One-shot expiry timer. It takes the registry write lock and is
        // generation-guarded, so racing an explicit delete or a
        // re-creation under the same id is safe.
        let registry = Arc::clone(&self.registry);
        let expired_id = scope_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            if registry.remove_if_generation(&expired_id, generation).await {
                info!(scope_id = %expired_id, "scope agent expired");
            }
        });
    }

    /// Delete a scope agent. Idempotent.
    pub async fn delete_scope(&self, event: &WorldEvent) {
        let Some(scope_id) = event.scope_id.as_ref() else {
            warn!("scope_deleted without a scope id, ignoring");
            return;
        };
        if self.registry.remove(scope_id).await {
            info!(scope_id = %scope_id, "scope agent deleted");
        } else {
            debug!(scope_id = %scope_id, "scope_deleted for unknown scope, no-op");
        }
    }

    /// Dispatch a narration pipeline as a detached task.
    ///
    /// Deliberately unbounded: a slow oracle call must never block event
    /// ingestion or the scheduler tick.
    pub fn spawn_narration(self: &Arc<Self>, scope_id: &ScopeId, reason: NarrationReason) {
        let engine = Arc::clone(self);
        let scope_id = scope_id.clone();
        tokio::spawn(async move {
            crate::narration::run(engine, scope_id, reason).await;
        });
    }

    /// The world-level pseudo-entity used for semantic context lookups.
    pub(crate) fn world_entity(world_id: &WorldId) -> EntityId {
        EntityId::new(format!("world:{world_id}"))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("oracle", &self.oracle.name())
            .field("oracle_timeout", &self.oracle_timeout)
            .finish()
    }
}

/// The expiry duration derived from an agent's trigger interval.
fn expiry_duration(trigger_interval_ms: u64) -> Duration {
    Duration::from_millis(
        trigger_interval_ms
            .saturating_mul(EXPIRY_INTERVALS)
            .max(MIN_EXPIRY_MS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_derives_from_trigger_interval() {
        assert_eq!(expiry_duration(60_000), Duration::from_millis(600_000));
        // Short intervals are clamped to the floor.
        assert_eq!(expiry_duration(1_000), Duration::from_millis(60_000));
    }

    #[test]
    fn world_entity_key_shape() {
        let id = Engine::world_entity(&WorldId::new("w1"));
        assert_eq!(id.as_str(), "world:w1");
    }
}
