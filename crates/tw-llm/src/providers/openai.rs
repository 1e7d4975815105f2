//! OpenAI chat completions backend.

use crate::adapter::{Completion, ProviderAdapter};
use crate::ledger::CostLedger;
use crate::providers::{build_client, require_api_key, require_model, resolve_endpoint};
use crate::LlmError;
use async_trait::async_trait;
use std::sync::Arc;
use tw_core::chat::ChatTurn;
use tw_core::provider::{GenerationParams, ProviderConfig, TokenUsage};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com";

pub struct OpenAiAdapter {
    config: ProviderConfig,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    ledger: Option<Arc<CostLedger>>,
}

impl OpenAiAdapter {
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
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::unavailable("openai", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::unavailable(
                "openai",
                format!("API returned status {status}: {error_body}"),
            ));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::unavailable("openai", format!("invalid response body: {e}")))?;

        let text = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::unavailable("openai", "response missing message content"))?
            .to_string();

        let usage = result["usage"]["prompt_tokens"].as_u64().map(|prompt| {
            TokenUsage::new(
                prompt as u32,
                result["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            )
        });

        Ok(Completion { text, usage })
    }

    async fn probe(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| LlmError::unavailable("openai", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::unavailable(
                "openai",
                format!("API returned status {status}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_core::provider::ProviderKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: &str) -> ProviderConfig {
        ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o")
            .with_api_key("sk-test")
            .with_endpoint(endpoint)
    }

    #[tokio::test]
    async fn complete_extracts_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"commands\": []}"}}],
                "usage": {"prompt_tokens": 42, "completion_tokens": 7}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new(test_config(&server.uri()), None).unwrap();
        let completion = adapter
            .complete(&[ChatTurn::user("hi")], GenerationParams::resolve(adapter.config(), None))
            .await
            .unwrap();

        assert_eq!(completion.text, "{\"commands\": []}");
        let usage = completion.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 42);
        assert_eq!(usage.completion_tokens, 7);
    }

    #[tokio::test]
    async fn request_body_carries_model_and_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new(test_config(&server.uri()), None).unwrap();
        adapter
            .complete(
                &[ChatTurn::system("be terse"), ChatTurn::user("hi")],
                GenerationParams::resolve(adapter.config(), None),
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 4096);
    }

    #[tokio::test]
    async fn error_status_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new(test_config(&server.uri()), None).unwrap();
        let err = adapter
            .complete(&[ChatTurn::user("hi")], GenerationParams::resolve(adapter.config(), None))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("429"), "got: {message}");
        assert!(message.contains("rate limited"), "got: {message}");
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new(test_config(&server.uri()), None).unwrap();
        let err = adapter
            .complete(&[ChatTurn::user("hi")], GenerationParams::resolve(adapter.config(), None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing message content"));
    }

    #[tokio::test]
    async fn probe_checks_model_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new(test_config(&server.uri()), None).unwrap();
        assert!(adapter.probe().await.is_ok());
        assert!(adapter.health_check().await);
    }

    #[test]
    fn construction_requires_api_key() {
        let config = ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o");
        assert!(matches!(
            OpenAiAdapter::new(config, None),
            Err(LlmError::Configuration(_))
        ));
    }
}
