//! Known-model catalog.
//!
//! Advisory listing for the `models` command and for settings validation
//! hints. Not exhaustive: any model id the backend accepts still works, and
//! an Ollama daemon may serve models this table has never heard of.

use serde::Serialize;
use tw_core::provider::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: ProviderKind,
    pub context_tokens: usize,
}

const OPENAI_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o",
        name: "GPT-4o",
        provider: ProviderKind::OpenAi,
        context_tokens: 128_000,
    },
    ModelInfo {
        id: "gpt-4o-mini",
        name: "GPT-4o mini",
        provider: ProviderKind::OpenAi,
        context_tokens: 128_000,
    },
    ModelInfo {
        id: "gpt-4-turbo",
        name: "GPT-4 Turbo",
        provider: ProviderKind::OpenAi,
        context_tokens: 128_000,
    },
    ModelInfo {
        id: "gpt-4",
        name: "GPT-4",
        provider: ProviderKind::OpenAi,
        context_tokens: 8_192,
    },
    ModelInfo {
        id: "gpt-3.5-turbo",
        name: "GPT-3.5 Turbo",
        provider: ProviderKind::OpenAi,
        context_tokens: 16_385,
    },
];

const ANTHROPIC_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-3-5-sonnet-latest",
        name: "Claude 3.5 Sonnet",
        provider: ProviderKind::Anthropic,
        context_tokens: 200_000,
    },
    ModelInfo {
        id: "claude-3-5-haiku-latest",
        name: "Claude 3.5 Haiku",
        provider: ProviderKind::Anthropic,
        context_tokens: 200_000,
    },
    ModelInfo {
        id: "claude-3-opus-latest",
        name: "Claude 3 Opus",
        provider: ProviderKind::Anthropic,
        context_tokens: 200_000,
    },
    ModelInfo {
        id: "claude-3-haiku-20240307",
        name: "Claude 3 Haiku",
        provider: ProviderKind::Anthropic,
        context_tokens: 200_000,
    },
];

const OLLAMA_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "llama3.1",
        name: "Llama 3.1",
        provider: ProviderKind::Ollama,
        context_tokens: 128_000,
    },
    ModelInfo {
        id: "llama3",
        name: "Llama 3",
        provider: ProviderKind::Ollama,
        context_tokens: 8_192,
    },
    ModelInfo {
        id: "mistral",
        name: "Mistral",
        provider: ProviderKind::Ollama,
        context_tokens: 32_768,
    },
    ModelInfo {
        id: "qwen2.5",
        name: "Qwen 2.5",
        provider: ProviderKind::Ollama,
        context_tokens: 32_768,
    },
    ModelInfo {
        id: "codellama",
        name: "Code Llama",
        provider: ProviderKind::Ollama,
        context_tokens: 16_384,
    },
];

pub fn known_models(kind: ProviderKind) -> &'static [ModelInfo] {
    match kind {
        ProviderKind::OpenAi => OPENAI_MODELS,
        ProviderKind::Anthropic => ANTHROPIC_MODELS,
        ProviderKind::Ollama => OLLAMA_MODELS,
    }
}

pub fn all_models() -> impl Iterator<Item = &'static ModelInfo> {
    OPENAI_MODELS
        .iter()
        .chain(ANTHROPIC_MODELS)
        .chain(OLLAMA_MODELS)
}
