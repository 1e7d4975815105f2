//! Backend-specific adapters.
//!
//! One module per wire protocol. Construction is fail-fast: a cloud adapter
//! without an API key or any adapter without a model name is a configuration
//! error at build time, not a request-time surprise.

use crate::adapter::COMPLETION_TIMEOUT;
use crate::LlmError;
use tw_core::provider::ProviderConfig;

pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

// ============================================================
// Shared construction helpers
// ============================================================

pub(crate) fn build_client() -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(COMPLETION_TIMEOUT)
        .build()
        .map_err(|e| LlmError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Configured endpoint override, or the backend default. Trailing slashes
/// are stripped so path joins stay predictable.
pub(crate) fn resolve_endpoint(config: &ProviderConfig, default: &str) -> String {
    config
        .endpoint
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

pub(crate) fn require_model(config: &ProviderConfig) -> Result<(), LlmError> {
    if config.model.trim().is_empty() {
        return Err(LlmError::Configuration(format!(
            "no model configured for provider '{}'",
            config.kind
        )));
    }
    Ok(())
}

pub(crate) fn require_api_key(config: &ProviderConfig) -> Result<String, LlmError> {
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(LlmError::Configuration(format!(
            "no API key configured for provider '{}'",
            config.kind
        ))),
    }
}
