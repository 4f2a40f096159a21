//! Geometry and semantic-context provider clients.
//!
//! Both providers are external collaborators reached over HTTP. Their
//! failures are absorbed here: a failing geometry lookup degrades to an
//! origin point, a failing context lookup to empty text, and the
//! narration cycle continues either way. Static variants back hermetic
//! tests and offline runs.

use std::collections::{BTreeMap, HashMap};

use chronicle_types::{EntityId, Geometry, WorldId};
use serde::Deserialize;
use tracing::warn;

/// Geometry lookups for scope focus entities.
#[derive(Debug)]
pub enum GeometryProvider {
    /// HTTP-backed provider.
    Http(HttpGeometryProvider),
    /// Fixed in-memory table.
    Static(StaticGeometryProvider),
}

impl GeometryProvider {
    /// A static provider with the given entity table.
    pub fn fixed(entries: HashMap<EntityId, Geometry>) -> Self {
        Self::Static(StaticGeometryProvider { entries })
    }

    /// An HTTP provider against a base URL.
    pub fn http(base_url: impl Into<String>) -> Self {
        Self::Http(HttpGeometryProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        })
    }

    /// The geometry of an entity, or the origin point when the provider
    /// fails or knows nothing about the entity.
    pub async fn geometry(&self, world_id: &WorldId, entity_id: &EntityId) -> Geometry {
        match self {
            Self::Http(provider) => provider.geometry(world_id, entity_id).await,
            Self::Static(provider) => provider
                .entries
                .get(entity_id)
                .cloned()
                .unwrap_or_else(Geometry::origin),
        }
    }
}

/// HTTP geometry provider.
///
/// `GET {base_url}/worlds/{world_id}/entities/{entity_id}/geometry`
/// returning a [`Geometry`] JSON document.
#[derive(Debug)]
pub struct HttpGeometryProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeometryProvider {
    async fn geometry(&self, world_id: &WorldId, entity_id: &EntityId) -> Geometry {
        let url = format!(
            "{}/worlds/{world_id}/entities/{entity_id}/geometry",
            self.base_url
        );
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = url, error = %e, "geometry request failed, using origin");
                return Geometry::origin();
            }
        };
        if !response.status().is_success() {
            warn!(url = url, status = %response.status(), "geometry lookup failed, using origin");
            return Geometry::origin();
        }
        match response.json::<Geometry>().await {
            Ok(geometry) => geometry,
            Err(e) => {
                warn!(url = url, error = %e, "geometry response malformed, using origin");
                Geometry::origin()
            }
        }
    }
}

/// Fixed geometry table for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticGeometryProvider {
    entries: HashMap<EntityId, Geometry>,
}

// ---------------------------------------------------------------------------
// Semantic context
// ---------------------------------------------------------------------------

/// Semantic-context lookups: textual descriptions of entities, filtered
/// by recent event types and relationship depth.
#[derive(Debug)]
pub enum SemanticProvider {
    /// HTTP-backed provider.
    Http(HttpSemanticProvider),
    /// Fixed in-memory table.
    Static(StaticSemanticProvider),
}

impl SemanticProvider {
    /// A static provider with the given per-entity text table.
    pub fn fixed(entries: HashMap<EntityId, String>) -> Self {
        Self::Static(StaticSemanticProvider { entries })
    }

    /// An HTTP provider against a base URL.
    pub fn http(base_url: impl Into<String>) -> Self {
        Self::Http(HttpSemanticProvider {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        })
    }

    /// Per-entity context text for the given entities.
    ///
    /// Entities the provider knows nothing about are absent from the
    /// result; a failing provider yields an empty map.
    pub async fn context_with_events(
        &self,
        entity_ids: &[EntityId],
        event_types: &[String],
        depth: u32,
    ) -> BTreeMap<EntityId, String> {
        match self {
            Self::Http(provider) => {
                provider.context_with_events(entity_ids, event_types, depth).await
            }
            Self::Static(provider) => entity_ids
                .iter()
                .filter_map(|id| {
                    provider.entries.get(id).map(|text| (id.clone(), text.clone()))
                })
                .collect(),
        }
    }
}

/// HTTP semantic-context provider.
///
/// `POST {base_url}/context` with `{entity_ids, event_types, depth}`
/// returning `{"contexts": {"<entity_id>": "<text>", ...}}`.
#[derive(Debug)]
pub struct HttpSemanticProvider {
    client: reqwest::Client,
    base_url: String,
}

/// Response body of the semantic-context endpoint.
#[derive(Debug, Deserialize)]
struct ContextResponse {
    #[serde(default)]
    contexts: BTreeMap<EntityId, String>,
}

impl HttpSemanticProvider {
    async fn context_with_events(
        &self,
        entity_ids: &[EntityId],
        event_types: &[String],
        depth: u32,
    ) -> BTreeMap<EntityId, String> {
        let url = format!("{}/context", self.base_url);
        let body = serde_json::json!({
            "entity_ids": entity_ids,
            "event_types": event_types,
            "depth": depth,
        });
        let response = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = url, error = %e, "context request failed, continuing without");
                return BTreeMap::new();
            }
        };
        if !response.status().is_success() {
            warn!(url = url, status = %response.status(), "context lookup failed, continuing without");
            return BTreeMap::new();
        }
        match response.json::<ContextResponse>().await {
            Ok(parsed) => parsed.contexts,
            Err(e) => {
                warn!(url = url, error = %e, "context response malformed, continuing without");
                BTreeMap::new()
            }
        }
    }
}

/// Fixed context table for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticSemanticProvider {
    entries: HashMap<EntityId, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_geometry_falls_back_to_origin() {
        let provider = GeometryProvider::fixed(HashMap::new());
        let g = provider.geometry(&WorldId::new("w1"), &EntityId::new("ghost")).await;
        assert_eq!(g, Geometry::origin());
    }

    #[tokio::test]
    async fn static_geometry_returns_known_entity() {
        let mut entries = HashMap::new();
        let geometry = Geometry::Circle {
            center: chronicle_types::Point::new(1.0, 2.0),
            radius: 9.0,
        };
        entries.insert(EntityId::new("place:market"), geometry.clone());
        let provider = GeometryProvider::fixed(entries);
        let g = provider.geometry(&WorldId::new("w1"), &EntityId::new("place:market")).await;
        assert_eq!(g, geometry);
    }

    #[tokio::test]
    async fn static_context_filters_unknown_entities() {
        let mut entries = HashMap::new();
        entries.insert(EntityId::new("a"), "text a".to_owned());
        let provider = SemanticProvider::fixed(entries);

        let result = provider
            .context_with_events(
                &[EntityId::new("a"), EntityId::new("b")],
                &[],
                2,
            )
            .await;
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(&EntityId::new("a")).map(String::as_str), Some("text a"));
    }
}
