//! Chronicle engine binary.
//!
//! This is the main entry point that wires together the bus, the
//! stores, the context providers, the oracle client, and the event
//! handlers. It loads configuration, initializes all subsystems, and
//! consumes control and domain events until the bus connection drops.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `chronicle-config.yaml`
//! 3. Connect the Dragonfly object store
//! 4. Load prompt templates and build the oracle backend
//! 5. Build the context providers
//! 6. Connect to NATS and subscribe (control + domain, queue group)
//! 7. Assemble the engine and run the event loops

mod bus;
mod config;
mod context;
mod engine;
mod error;
mod narration;
mod registry;
mod scheduler;
mod trigger;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chronicle_oracle::{create_backend, BackendType, OracleConfig, PromptEngine};
use chronicle_store::{DragonflyStore, ObjectStore, ProfileStore, SnapshotStore};
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::bus::{Bus, NatsBus};
use crate::config::EngineConfig;
use crate::context::{GeometryProvider, SemanticProvider};
use crate::engine::Engine;

/// Application entry point for the Chronicle engine.
///
/// # Errors
///
/// Returns an error if any initialization step fails. Event-handling
/// failures are logged and absorbed; they never terminate the process.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("chronicle-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        nats_url = config.infrastructure.nats_url,
        dragonfly_url = config.infrastructure.dragonfly_url,
        oracle_backend = config.oracle.backend,
        oracle_timeout_ms = config.oracle.timeout_ms,
        "Configuration loaded"
    );

    // 3. Connect the object store.
    let dragonfly = DragonflyStore::connect(&config.infrastructure.dragonfly_url).await?;
    let profiles = ProfileStore::with_ttl(
        ObjectStore::Dragonfly(dragonfly.clone()),
        config.profiles.cache_ttl_ms,
    );
    let snapshots = SnapshotStore::new(ObjectStore::Dragonfly(dragonfly));
    info!("Object store connected");

    // 4. Prompt templates and oracle backend.
    let prompts = PromptEngine::new(&config.oracle.templates_dir)?;
    let Some(backend_type) = BackendType::parse(&config.oracle.backend) else {
        anyhow::bail!("unknown oracle backend: {}", config.oracle.backend);
    };
    let oracle = create_backend(&OracleConfig {
        backend_type,
        api_url: config.oracle.api_url.clone(),
        api_key: config.oracle.api_key.clone(),
        model: config.oracle.model.clone(),
    });
    info!(backend = oracle.name(), model = config.oracle.model, "Oracle backend ready");

    // 5. Context providers. Empty URLs select the static (offline)
    //    variants, which return conservative defaults.
    let geometry = if config.context.geometry_url.is_empty() {
        warn!("no geometry provider configured, every entity sits at the origin");
        GeometryProvider::fixed(std::collections::HashMap::new())
    } else {
        GeometryProvider::http(config.context.geometry_url.clone())
    };
    let semantic = if config.context.semantic_url.is_empty() {
        warn!("no semantic provider configured, narration runs without entity context");
        SemanticProvider::fixed(std::collections::HashMap::new())
    } else {
        SemanticProvider::http(config.context.semantic_url.clone())
    };

    // 6. Connect to NATS and subscribe.
    let nats = NatsBus::connect(&config.infrastructure.nats_url).await?;
    let mut control_sub = nats.subscribe_control().await?;
    let mut domain_sub = nats.subscribe_domain().await?;

    // 7. Assemble the engine.
    let engine = Arc::new(Engine::new(
        profiles,
        snapshots,
        geometry,
        semantic,
        Bus::Nats(nats),
        prompts,
        oracle,
        Duration::from_millis(config.oracle.timeout_ms),
        config.context.depth,
        config.snapshots.keep_revisions,
    ));
    info!("Engine assembled, consuming events");

    // Domain events drain on their own task so a burst on one subject
    // never starves the other.
    let domain_engine = Arc::clone(&engine);
    let domain_loop = tokio::spawn(async move {
        while let Some(message) = domain_sub.next().await {
            match bus::decode_event(&message.payload) {
                Ok(event) => trigger::on_domain_event(&domain_engine, event).await,
                Err(e) => {
                    warn!(
                        subject = message.subject.to_string(),
                        error = %e,
                        "failed to decode domain event, skipping"
                    );
                }
            }
        }
        info!("domain subscription ended");
    });

    while let Some(message) = control_sub.next().await {
        match bus::decode_event(&message.payload) {
            Ok(event) => engine.handle_control(&event).await,
            Err(e) => {
                warn!(
                    subject = message.subject.to_string(),
                    error = %e,
                    "failed to decode control event, skipping"
                );
            }
        }
    }

    info!("control subscription ended, shutting down");
    domain_loop.abort();
    Ok(())
}

/// Load the engine configuration from `chronicle-config.yaml`.
///
/// Looks for the config file relative to the current working directory
/// and falls back to defaults (plus env overrides) when absent.
fn load_config() -> Result<EngineConfig, crate::error::EngineError> {
    let config_path = Path::new("chronicle-config.yaml");
    if config_path.exists() {
        Ok(EngineConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        // Parsing an empty document still applies the env overrides.
        Ok(EngineConfig::parse("{}").unwrap_or_default())
    }
}
