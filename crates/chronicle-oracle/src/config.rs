//! Configuration for the oracle HTTP backend.

/// Configuration for a single oracle backend.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// The backend type (openai-compatible or anthropic).
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported oracle backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions API (works with `OpenAI`,
    /// `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API (different request format).
    Anthropic,
}

impl BackendType {
    /// Parse a backend name from configuration.
    ///
    /// Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_name_parsing() {
        assert_eq!(BackendType::parse("openai"), Some(BackendType::OpenAi));
        assert_eq!(BackendType::parse("Claude"), Some(BackendType::Anthropic));
        assert_eq!(BackendType::parse("mystery"), None);
    }
}
