//! tw-llm: Natural language to browser commands through an LLM
//!
//! Per request: [`prompt::build_messages`] shapes the conversation, a
//! [`adapter::ProviderAdapter`] ships it to a backend, and
//! [`response::parse_reply`] turns the reply into commands. The
//! [`router::AdapterRouter`] picks which configured backend (OpenAI,
//! Anthropic, Ollama) handles a request, health-checking the primary and
//! walking fallbacks when it is down. Every successful call is recorded on
//! the shared [`ledger::CostLedger`].

pub mod adapter;
pub mod catalog;
pub mod ledger;
pub mod prompt;
pub mod providers;
pub mod response;
pub mod router;

pub use adapter::{Completion, ProviderAdapter};
pub use ledger::{CostLedger, CostRecord, LedgerTotals};
pub use router::{build_adapter, AdapterRouter, RouterSettings};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Bad or missing configuration. Raised at construction time, never
    /// during a request.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The backend could not be reached or answered with a failure status.
    #[error("provider '{provider}' unavailable: {message}")]
    Unavailable { provider: String, message: String },
    /// The model answered, but not with JSON this pipeline understands.
    /// Terminal for the request; the raw text is kept for diagnostics.
    #[error("failed to parse model response: {message}")]
    ResponseParse { message: String, raw: String },
}

impl LlmError {
    pub(crate) fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        LlmError::Unavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
