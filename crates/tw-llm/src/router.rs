//! Provider selection with health-checked fallback.
//!
//! Every selection probes live; health is never cached. A primary that was
//! down a minute ago gets a fresh chance on the next request, and one that
//! just died stops being selected immediately.

use crate::adapter::ProviderAdapter;
use crate::ledger::CostLedger;
use crate::providers::{AnthropicAdapter, OllamaAdapter, OpenAiAdapter};
use crate::LlmError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tw_core::provider::{ProviderConfig, ProviderKind};

// ============================================================
// Settings
// ============================================================

/// Which backends exist and in what order to prefer them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    pub primary: ProviderKind,
    #[serde(default)]
    pub fallbacks: Vec<ProviderKind>,
    pub providers: Vec<ProviderConfig>,
}

impl RouterSettings {
    pub fn config_for(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.iter().find(|c| c.kind == kind)
    }
}

/// Construct the adapter matching the config's kind.
pub fn build_adapter(
    config: ProviderConfig,
    ledger: Option<Arc<CostLedger>>,
) -> Result<Arc<dyn ProviderAdapter>, LlmError> {
    Ok(match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new(config, ledger)?),
        ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(config, ledger)?),
        ProviderKind::Ollama => Arc::new(OllamaAdapter::new(config, ledger)?),
    })
}

// ============================================================
// Router
// ============================================================

pub struct AdapterRouter {
    primary: Arc<dyn ProviderAdapter>,
    fallbacks: Vec<Arc<dyn ProviderAdapter>>,
}

impl AdapterRouter {
    pub fn new(
        primary: Arc<dyn ProviderAdapter>,
        fallbacks: Vec<Arc<dyn ProviderAdapter>>,
    ) -> Self {
        Self { primary, fallbacks }
    }

    /// Build every configured adapter up front. A missing or invalid primary
    /// is fatal; a broken fallback is only a warning because the tool still
    /// works without it.
    pub fn from_settings(
        settings: &RouterSettings,
        ledger: Option<Arc<CostLedger>>,
    ) -> Result<Self, LlmError> {
        let primary_config = settings.config_for(settings.primary).cloned().ok_or_else(|| {
            LlmError::Configuration(format!(
                "primary provider '{}' has no configuration",
                settings.primary
            ))
        })?;
        let primary = build_adapter(primary_config, ledger.clone())?;

        let mut fallbacks = Vec::new();
        for kind in &settings.fallbacks {
            if *kind == settings.primary {
                continue;
            }
            let Some(config) = settings.config_for(*kind).cloned() else {
                tracing::warn!(provider = %kind, "fallback provider has no configuration, skipping");
                continue;
            };
            match build_adapter(config, ledger.clone()) {
                Ok(adapter) => fallbacks.push(adapter),
                Err(e) => {
                    tracing::warn!(provider = %kind, error = %e, "skipping fallback provider")
                }
            }
        }

        Ok(Self { primary, fallbacks })
    }

    pub fn primary(&self) -> &Arc<dyn ProviderAdapter> {
        &self.primary
    }

    /// Primary first, then fallbacks in preference order.
    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn ProviderAdapter>> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }

    /// Pick the adapter to serve the next request. Healthy primary wins;
    /// otherwise the first healthy fallback. When everything is down the
    /// primary is returned anyway so the caller gets that backend's real
    /// error instead of a synthetic one.
    pub async fn select(&self) -> Arc<dyn ProviderAdapter> {
        if self.primary.health_check().await {
            return Arc::clone(&self.primary);
        }
        tracing::warn!(
            provider = %self.primary.kind(),
            "primary provider failed health check, trying fallbacks"
        );

        for fallback in &self.fallbacks {
            if fallback.health_check().await {
                tracing::info!(provider = %fallback.kind(), model = %fallback.model(), "using fallback provider");
                return Arc::clone(fallback);
            }
        }

        tracing::warn!(
            provider = %self.primary.kind(),
            "no healthy provider found, proceeding with primary"
        );
        Arc::clone(&self.primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Completion;
    use async_trait::async_trait;
    use tw_core::chat::ChatTurn;
    use tw_core::provider::GenerationParams;

    struct FixedHealth {
        config: ProviderConfig,
        healthy: bool,
    }

    impl FixedHealth {
        fn arc(kind: ProviderKind, model: &str, healthy: bool) -> Arc<dyn ProviderAdapter> {
            Arc::new(Self {
                config: ProviderConfig::new(kind, model),
                healthy,
            })
        }
    }

    #[async_trait]
    impl ProviderAdapter for FixedHealth {
        fn config(&self) -> &ProviderConfig {
            &self.config
        }

        fn ledger(&self) -> Option<&CostLedger> {
            None
        }

        async fn complete(
            &self,
            _messages: &[ChatTurn],
            _params: GenerationParams,
        ) -> Result<Completion, LlmError> {
            Err(LlmError::unavailable(self.config.kind.to_string(), "not wired"))
        }

        async fn probe(&self) -> Result<(), LlmError> {
            if self.healthy {
                Ok(())
            } else {
                Err(LlmError::unavailable(self.config.kind.to_string(), "down"))
            }
        }
    }

    #[tokio::test]
    async fn healthy_primary_wins() {
        let router = AdapterRouter::new(
            FixedHealth::arc(ProviderKind::OpenAi, "primary-model", true),
            vec![FixedHealth::arc(ProviderKind::Ollama, "fallback-model", true)],
        );
        assert_eq!(router.select().await.model(), "primary-model");
    }

    #[tokio::test]
    async fn unhealthy_primary_falls_back_in_order() {
        let router = AdapterRouter::new(
            FixedHealth::arc(ProviderKind::OpenAi, "primary-model", false),
            vec![
                FixedHealth::arc(ProviderKind::Anthropic, "first-fallback", false),
                FixedHealth::arc(ProviderKind::Ollama, "second-fallback", true),
            ],
        );
        assert_eq!(router.select().await.model(), "second-fallback");
    }

    #[tokio::test]
    async fn all_down_returns_primary() {
        let router = AdapterRouter::new(
            FixedHealth::arc(ProviderKind::OpenAi, "primary-model", false),
            vec![FixedHealth::arc(ProviderKind::Ollama, "fallback-model", false)],
        );
        assert_eq!(router.select().await.model(), "primary-model");
    }

    #[test]
    fn from_settings_requires_primary_config() {
        let settings = RouterSettings {
            primary: ProviderKind::OpenAi,
            fallbacks: vec![],
            providers: vec![ProviderConfig::new(ProviderKind::Ollama, "llama3")],
        };
        let Err(err) = AdapterRouter::from_settings(&settings, None) else {
            panic!("expected a configuration error");
        };
        assert!(matches!(err, LlmError::Configuration(_)));
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn from_settings_skips_unconfigured_fallbacks() {
        let settings = RouterSettings {
            primary: ProviderKind::Ollama,
            fallbacks: vec![ProviderKind::Anthropic, ProviderKind::Ollama],
            providers: vec![ProviderConfig::new(ProviderKind::Ollama, "llama3")],
        };
        let router = AdapterRouter::from_settings(&settings, None).unwrap();
        // unconfigured anthropic dropped, primary not doubled as a fallback
        assert_eq!(router.adapters().count(), 1);
    }

    #[test]
    fn from_settings_builds_configured_fallbacks() {
        let settings = RouterSettings {
            primary: ProviderKind::Ollama,
            fallbacks: vec![ProviderKind::OpenAi],
            providers: vec![
                ProviderConfig::new(ProviderKind::Ollama, "llama3"),
                ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o").with_api_key("sk-test"),
            ],
        };
        let router = AdapterRouter::from_settings(&settings, None).unwrap();
        assert_eq!(router.adapters().count(), 2);
        assert_eq!(router.primary().kind(), ProviderKind::Ollama);
    }

    #[test]
    fn settings_deserialize_with_default_fallbacks() {
        let settings: RouterSettings = serde_json::from_str(
            r#"{"primary": "ollama", "providers": [{"kind": "ollama", "model": "llama3"}]}"#,
        )
        .unwrap();
        assert_eq!(settings.primary, ProviderKind::Ollama);
        assert!(settings.fallbacks.is_empty());
    }
}
