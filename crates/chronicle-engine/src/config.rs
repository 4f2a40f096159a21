//! Configuration loading and typed config structures for the engine.
//!
//! The canonical configuration lives in `chronicle-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror
//! the YAML structure and provides a loader that reads the file.
//! Environment variables override YAML values for infrastructure URLs
//! and oracle credentials, so deployments never write secrets to disk.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `chronicle-config.yaml`. All fields have
/// defaults so a missing file still yields a runnable (offline)
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Oracle backend settings.
    #[serde(default)]
    pub oracle: OracleSettings,

    /// Context-provider endpoints.
    #[serde(default)]
    pub context: ContextSettings,

    /// Snapshot retention settings.
    #[serde(default)]
    pub snapshots: SnapshotSettings,

    /// Profile-store cache settings.
    #[serde(default)]
    pub profiles: ProfileSettings,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `NATS_URL` overrides `infrastructure.nats_url`
    /// - `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url`
    /// - `ORACLE_API_URL`, `ORACLE_API_KEY`, `ORACLE_MODEL`,
    ///   `ORACLE_BACKEND` override the matching `oracle` fields
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment-variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("NATS_URL") {
            self.infrastructure.nats_url = url;
        }
        if let Ok(url) = std::env::var("DRAGONFLY_URL") {
            self.infrastructure.dragonfly_url = url;
        }
        if let Ok(url) = std::env::var("ORACLE_API_URL") {
            self.oracle.api_url = url;
        }
        if let Ok(key) = std::env::var("ORACLE_API_KEY") {
            self.oracle.api_key = key;
        }
        if let Ok(model) = std::env::var("ORACLE_MODEL") {
            self.oracle.model = model;
        }
        if let Ok(backend) = std::env::var("ORACLE_BACKEND") {
            self.oracle.backend = backend;
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InfrastructureConfig {
    /// NATS server URL.
    pub nats_url: String,
    /// Dragonfly (Redis-compatible) URL for the object store.
    pub dragonfly_url: String,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_owned(),
            dragonfly_url: "redis://localhost:6379".to_owned(),
        }
    }
}

/// Oracle backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Backend name: `openai`, `deepseek`, `ollama`, `anthropic`.
    pub backend: String,
    /// Base API URL.
    pub api_url: String,
    /// API key (normally supplied via `ORACLE_API_KEY`).
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Hard deadline for one oracle call, in milliseconds.
    pub timeout_ms: u64,
    /// Directory holding the prompt templates.
    pub templates_dir: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            backend: "openai".to_owned(),
            api_url: "https://api.openai.com/v1".to_owned(),
            api_key: String::new(),
            model: "gpt-5-nano".to_owned(),
            timeout_ms: 7_000,
            templates_dir: "templates".to_owned(),
        }
    }
}

/// Context-provider endpoints.
///
/// Empty URLs select the built-in static providers, which return
/// conservative defaults -- useful for offline runs and tests.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Geometry provider base URL.
    pub geometry_url: String,
    /// Semantic-context provider base URL.
    pub semantic_url: String,
    /// Relationship depth passed to the semantic provider.
    pub depth: u32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            geometry_url: String::new(),
            semantic_url: String::new(),
            depth: 2,
        }
    }
}

/// Snapshot retention settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Revisions kept per scope after pruning.
    pub keep_revisions: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self { keep_revisions: 5 }
    }
}

/// Profile-store cache settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    /// Cache invalidation interval in milliseconds.
    pub cache_ttl_ms: i64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self { cache_ttl_ms: 60_000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_runnable() {
        let config = EngineConfig::default();
        assert!(!config.infrastructure.nats_url.is_empty());
        assert_eq!(config.oracle.timeout_ms, 7_000);
        assert_eq!(config.snapshots.keep_revisions, 5);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r"
oracle:
  timeout_ms: 2500
snapshots:
  keep_revisions: 3
";
        let config = EngineConfig::parse(yaml).unwrap_or_default();
        assert_eq!(config.oracle.timeout_ms, 2_500);
        assert_eq!(config.snapshots.keep_revisions, 3);
        assert_eq!(config.context.depth, 2);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = EngineConfig::parse(": not yaml : [");
        assert!(result.is_err());
    }
}
