//! Error types for the oracle client.
//!
//! Uses `thiserror` for typed errors surfacing through the narration
//! pipeline: template rendering, HTTP backend calls, reply parsing.
//! Every variant means "this narration produced no output"; none of
//! them is fatal to the engine.

/// Errors that can occur while invoking the oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Failed to render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// The HTTP backend returned an error or was unreachable.
    #[error("oracle backend error: {0}")]
    Backend(String),

    /// The reply could not be parsed as an oracle reply.
    #[error("reply parse error: {0}")]
    Parse(String),

    /// The reply parsed but carried an empty narrative.
    #[error("oracle returned an empty narrative")]
    EmptyNarrative,

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
