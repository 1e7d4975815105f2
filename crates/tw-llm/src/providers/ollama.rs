//! Ollama local backend.
//!
//! No credentials; health is just whether the daemon answers. Generation
//! knobs ride in the `options` object and streaming is disabled so the
//! reply arrives as one JSON document.

use crate::adapter::{Completion, ProviderAdapter};
use crate::ledger::CostLedger;
use crate::providers::{build_client, require_model, resolve_endpoint};
use crate::LlmError;
use async_trait::async_trait;
use std::sync::Arc;
use tw_core::chat::ChatTurn;
use tw_core::provider::{GenerationParams, ProviderConfig, TokenUsage};

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

pub struct OllamaAdapter {
    config: ProviderConfig,
    client: reqwest::Client,
    endpoint: String,
    ledger: Option<Arc<CostLedger>>,
}

impl OllamaAdapter {
    pub fn new(
        config: ProviderConfig,
        ledger: Option<Arc<CostLedger>>,
    ) -> Result<Self, LlmError> {
        require_model(&config)?;
        let endpoint = resolve_endpoint(&config, DEFAULT_ENDPOINT);
        Ok(Self {
            config,
            client: build_client()?,
            endpoint,
            ledger,
        })
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
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
            "stream": false,
            "options": {
                "num_predict": params.max_tokens,
                "temperature": params.temperature,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::unavailable("ollama", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::unavailable(
                "ollama",
                format!("API returned status {status}: {error_body}"),
            ));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::unavailable("ollama", format!("invalid response body: {e}")))?;

        let text = result["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::unavailable("ollama", "response missing message content"))?
            .to_string();

        let usage = result["prompt_eval_count"].as_u64().map(|prompt| {
            TokenUsage::new(
                prompt as u32,
                result["eval_count"].as_u64().unwrap_or(0) as u32,
            )
        });

        Ok(Completion { text, usage })
    }

    async fn probe(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .await
            .map_err(|e| LlmError::unavailable("ollama", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::unavailable(
                "ollama",
                format!("API returned status {status}"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_core::provider::{GenerationOverrides, ProviderKind};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: &str) -> ProviderConfig {
        ProviderConfig::new(ProviderKind::Ollama, "llama3").with_endpoint(endpoint)
    }

    #[tokio::test]
    async fn complete_extracts_text_and_eval_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "{\"commands\": []}"},
                "prompt_eval_count": 25,
                "eval_count": 11,
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OllamaAdapter::new(test_config(&server.uri()), None).unwrap();
        let completion = adapter
            .complete(&[ChatTurn::user("hi")], GenerationParams::resolve(adapter.config(), None))
            .await
            .unwrap();

        assert_eq!(completion.text, "{\"commands\": []}");
        let usage = completion.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 25);
        assert_eq!(usage.completion_tokens, 11);
    }

    #[tokio::test]
    async fn request_disables_streaming_and_maps_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"content": "ok"}
            })))
            .mount(&server)
            .await;

        let adapter = OllamaAdapter::new(test_config(&server.uri()), None).unwrap();
        let overrides = GenerationOverrides {
            temperature: Some(0.9),
            max_tokens: Some(256),
        };
        let params = GenerationParams::resolve(adapter.config(), Some(&overrides));
        adapter.complete(&[ChatTurn::user("hi")], params).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 256);
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_usage_counts_leave_usage_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"content": "ok"}
            })))
            .mount(&server)
            .await;

        let adapter = OllamaAdapter::new(test_config(&server.uri()), None).unwrap();
        let completion = adapter
            .complete(&[ChatTurn::user("hi")], GenerationParams::resolve(adapter.config(), None))
            .await
            .unwrap();
        assert!(completion.usage.is_none());
    }

    #[tokio::test]
    async fn probe_lists_local_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;

        let adapter = OllamaAdapter::new(test_config(&server.uri()), None).unwrap();
        assert!(adapter.probe().await.is_ok());
        assert!(adapter.health_check().await);
    }

    #[tokio::test]
    async fn unreachable_daemon_is_unavailable() {
        // Port 9 is the discard service; nothing is listening there.
        let config = test_config("http://127.0.0.1:9");
        let adapter = OllamaAdapter::new(config, None).unwrap();
        let err = adapter.probe().await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { .. }));
    }

    #[test]
    fn no_api_key_needed() {
        let config = ProviderConfig::new(ProviderKind::Ollama, "llama3");
        assert!(OllamaAdapter::new(config, None).is_ok());
    }
}
