//! Anthropic messages backend.
//!
//! The messages API takes the system prompt as a top-level field, not as a
//! message, so the turn list is split by role before shipping.

use crate::adapter::{Completion, ProviderAdapter};
use crate::ledger::CostLedger;
use crate::providers::{build_client, require_api_key, require_model, resolve_endpoint};
use crate::LlmError;
use async_trait::async_trait;
use std::sync::Arc;
use tw_core::chat::{ChatTurn, Role};
use tw_core::provider::{GenerationParams, ProviderConfig, TokenUsage};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    config: ProviderConfig,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    ledger: Option<Arc<CostLedger>>,
}

impl AnthropicAdapter {
    pub fn new(
        config: ProviderConfig,
        ledger: Option<Arc<CostLedger>>,
    ) -> Result<Self, LlmError> {
        require_model(&config)?;
        let api_key = require_api_key(&config)?;
        let endpoint = resolve_endpoint(&config, DEFAULT_ENDPOINT);
        Ok(Self {
            config,
            client: build_client()?,
            endpoint,
            api_key,
            ledger,
        })
    }

    async fn send_messages(
        &self,
        request_body: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(request_body)
            .send()
            .await
            .map_err(|e| LlmError::unavailable("anthropic", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::unavailable(
                "anthropic",
                format!("API returned status {status}: {error_body}"),
            ));
        }

        response.json().await.map_err(|e| {
            LlmError::unavailable("anthropic", format!("invalid response body: {e}"))
        })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn ledger(&self) -> Option<&CostLedger> {
        self.ledger.as_deref()
    }

    async fn complete(
        &self,
        messages: &[ChatTurn],
        params: GenerationParams,
    ) -> Result<Completion, LlmError> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let chat: Vec<&ChatTurn> = messages.iter().filter(|m| m.role != Role::System).collect();

        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "system": system.join("\n\n"),
            "messages": chat,
        });

        let result = self.send_messages(&request_body).await?;

        let text = result["content"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::unavailable("anthropic", "response missing text content"))?
            .to_string();

        let usage = result["usage"]["input_tokens"].as_u64().map(|input| {
            TokenUsage::new(
                input as u32,
                result["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
            )
        });

        Ok(Completion { text, usage })
    }

    async fn probe(&self) -> Result<(), LlmError> {
        // Smallest possible request that exercises auth end to end.
        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": 1,
            "messages": [{"role": "user", "content": "Hi"}],
        });
        self.send_messages(&request_body).await.map(|_| ())
    }
}
