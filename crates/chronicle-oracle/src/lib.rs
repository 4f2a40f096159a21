//! Generation-service ("oracle") client for the Chronicle engine.
//!
//! The oracle turns structured scope context into a narrative
//! continuation plus candidate follow-up events. This crate owns the
//! whole collaborator contract: rendering the structured context into a
//! system/user prompt, the HTTP call to an OpenAI-compatible or
//! Anthropic backend, and tolerant parsing of the JSON reply. The
//! engine core never sees raw HTTP or raw model output.

pub mod client;
pub mod config;
pub mod error;
pub mod parse;
pub mod prompt;

pub use client::{create_backend, OracleBackend};
pub use config::{BackendType, OracleConfig};
pub use error::OracleError;
pub use parse::parse_oracle_reply;
pub use prompt::{NarrationContext, PromptEngine, RenderedPrompt};
