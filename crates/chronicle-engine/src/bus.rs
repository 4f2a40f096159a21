//! NATS pub/sub integration for event intake and publication.
//!
//! The engine consumes control events on [`CONTROL_SUBJECT`] and domain
//! events on [`DOMAIN_SUBJECT`], both under the [`QUEUE_GROUP`] queue
//! group so each message reaches exactly one engine instance. Narration
//! output is published per world on `chronicle.world.{world_id}.events`
//! and is fire-and-forget from the engine's perspective.
//!
//! An in-memory variant exists for hermetic tests; it only records what
//! would have been published.

use std::sync::Arc;

use chronicle_types::WorldEvent;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::EngineError;

/// Subject carrying scope lifecycle and clock-tick control events.
pub const CONTROL_SUBJECT: &str = "chronicle.control";

/// Wildcard subject carrying domain events from all producers.
pub const DOMAIN_SUBJECT: &str = "chronicle.events.>";

/// Queue group name: at-least-once delivery to exactly one member.
pub const QUEUE_GROUP: &str = "chronicle-engine";

/// Publishing side of the bus, shared by the narration pipelines.
///
/// Enum dispatch for the same reason as the stores: async methods are
/// not dyn-compatible.
#[derive(Debug, Clone)]
pub enum Bus {
    /// Live NATS connection.
    Nats(NatsBus),
    /// In-memory recorder for tests.
    Memory(MemoryBus),
}

impl Bus {
    /// Publish a narration output event onto its world subject.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if serialization or publishing
    /// fails. Callers treat this as fire-and-forget and only log.
    pub async fn publish_world_event(&self, event: &WorldEvent) -> Result<(), EngineError> {
        match self {
            Self::Nats(bus) => bus.publish_world_event(event).await,
            Self::Memory(bus) => bus.publish_world_event(event).await,
        }
    }
}

// ---------------------------------------------------------------------------
// NATS backend
// ---------------------------------------------------------------------------

/// NATS client wrapper for the engine.
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl std::fmt::Debug for NatsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBus").field("connected", &true).finish()
    }
}

impl NatsBus {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self, EngineError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url).await.map_err(|e| EngineError::Nats {
            message: format!("failed to connect to {url}: {e}"),
        })?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Subscribe to control events under the engine queue group.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the subscription fails.
    pub async fn subscribe_control(&self) -> Result<async_nats::Subscriber, EngineError> {
        self.queue_subscribe(CONTROL_SUBJECT).await
    }

    /// Subscribe to domain events under the engine queue group.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the subscription fails.
    pub async fn subscribe_domain(&self) -> Result<async_nats::Subscriber, EngineError> {
        self.queue_subscribe(DOMAIN_SUBJECT).await
    }

    /// Queue-group subscribe to a subject.
    async fn queue_subscribe(
        &self,
        subject: &'static str,
    ) -> Result<async_nats::Subscriber, EngineError> {
        debug!(subject = subject, group = QUEUE_GROUP, "subscribing");
        let subscriber = self
            .client
            .queue_subscribe(subject.to_owned(), QUEUE_GROUP.to_owned())
            .await
            .map_err(|e| EngineError::Nats {
                message: format!("failed to subscribe to {subject}: {e}"),
            })?;
        info!(subject = subject, "subscription established");
        Ok(subscriber)
    }

    /// Publish a narration output event.
    async fn publish_world_event(&self, event: &WorldEvent) -> Result<(), EngineError> {
        let subject = world_subject(event);
        let payload = serde_json::to_vec(event)?;
        debug!(
            subject = subject,
            event_type = event.event_type,
            event_id = %event.id,
            "publishing world event"
        );
        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| EngineError::Nats {
                message: format!("failed to publish to {subject}: {e}"),
            })?;
        Ok(())
    }
}

/// Deserialize a bus message payload into a [`WorldEvent`].
///
/// # Errors
///
/// Returns [`EngineError::Serde`] if deserialization fails.
pub fn decode_event(data: &[u8]) -> Result<WorldEvent, EngineError> {
    Ok(serde_json::from_slice(data)?)
}

/// The output subject for an event's world.
fn world_subject(event: &WorldEvent) -> String {
    format!("chronicle.world.{}.events", event.world_id)
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory bus that records published events for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    published: Arc<Mutex<Vec<WorldEvent>>>,
}

impl MemoryBus {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far, in publish order.
    pub async fn published(&self) -> Vec<WorldEvent> {
        self.published.lock().await.clone()
    }

    async fn publish_world_event(&self, event: &WorldEvent) -> Result<(), EngineError> {
        self.published.lock().await.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chronicle_types::{EventId, WorldId};

    use super::*;

    fn test_event() -> WorldEvent {
        WorldEvent {
            id: EventId::new("e1"),
            event_type: "narration".to_owned(),
            timestamp_ms: 1,
            source: "chronicle".to_owned(),
            world_id: WorldId::new("w1"),
            scope_id: None,
            payload: serde_json::Value::Null,
            state_changes: None,
        }
    }

    #[test]
    fn world_subject_embeds_world_id() {
        assert_eq!(world_subject(&test_event()), "chronicle.world.w1.events");
    }

    #[test]
    fn decode_valid_event() {
        let bytes = serde_json::to_vec(&test_event()).unwrap_or_default();
        let decoded = decode_event(&bytes);
        assert!(decoded.is_ok());
    }

    #[test]
    fn decode_invalid_event() {
        assert!(decode_event(b"not json").is_err());
    }

    #[tokio::test]
    async fn memory_bus_records_publishes() {
        let memory = MemoryBus::new();
        let bus = Bus::Memory(memory.clone());
        bus.publish_world_event(&test_event()).await.ok();
        let published = memory.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published.first().map(|e| e.event_type.as_str()), Some("narration"));
    }

    // Integration tests that require a live NATS server are marked #[ignore].
    #[tokio::test]
    #[ignore]
    async fn connect_to_nats() {
        let result = NatsBus::connect("nats://localhost:4222").await;
        assert!(result.is_ok());
    }
}
