//! The per-backend provider seam plus the shared request flow.
//!
//! Concrete adapters implement only backend specifics: request shaping in
//! `complete` and a cheap liveness `probe`. The full parse flow (prompt
//! build → complete under timeout → response parse → usage/cost → ledger)
//! and the health check live here as provided methods so every backend
//! behaves identically around its HTTP call.

use crate::ledger::{pricing_for, CostLedger, CostRecord};
use crate::prompt;
use crate::response;
use crate::LlmError;
use async_trait::async_trait;
use std::time::Duration;
use tw_core::chat::ChatTurn;
use tw_core::parse::{ParseContext, ParseResult};
use tw_core::provider::{GenerationParams, ProviderConfig, ProviderKind, TokenUsage};

/// Upper bound on one completion round-trip.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound on a health probe. Short: an unhealthy provider should cost
/// the fallback walk seconds, not minutes.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw reply text plus whatever accounting the backend reported.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The validated configuration this adapter was constructed from.
    fn config(&self) -> &ProviderConfig;

    /// Shared cost ledger, when accounting is wired up.
    fn ledger(&self) -> Option<&CostLedger>;

    /// Send the message list to the backend and return its reply text.
    async fn complete(
        &self,
        messages: &[ChatTurn],
        params: GenerationParams,
    ) -> Result<Completion, LlmError>;

    /// Cheapest request that proves the backend is reachable and the
    /// credentials work.
    async fn probe(&self) -> Result<(), LlmError>;

    fn kind(&self) -> ProviderKind {
        self.config().kind
    }

    fn model(&self) -> &str {
        &self.config().model
    }

    /// Turn a natural-language request into a [`ParseResult`].
    async fn parse(&self, input: &str, context: &ParseContext) -> Result<ParseResult, LlmError> {
        let params = GenerationParams::resolve(self.config(), context.overrides.as_ref());
        let messages = prompt::build_messages(input, context);
        tracing::trace!(provider = %self.kind(), messages = ?messages, "prompt payload");

        let completion =
            match tokio::time::timeout(COMPLETION_TIMEOUT, self.complete(&messages, params)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(LlmError::unavailable(
                        self.kind().to_string(),
                        format!("no reply within {}s", COMPLETION_TIMEOUT.as_secs()),
                    ))
                }
            };

        let mut result = response::parse_reply(&completion.text)?;
        let usage = completion
            .usage
            .unwrap_or_else(|| estimate_usage(&messages, &completion.text));
        result.cost = pricing_for(self.kind(), self.model()).map(|p| p.cost(&usage));
        result.usage = Some(usage);

        if let Some(ledger) = self.ledger() {
            let record = CostRecord {
                provider: self.kind().to_string(),
                model: self.model().to_string(),
                usage,
                cost: result.cost,
                timestamp: chrono::Utc::now(),
            };
            if ledger.record(record).is_err() {
                tracing::debug!(provider = %self.kind(), "cost ledger full, dropping record");
            }
        }

        tracing::debug!(
            provider = %self.kind(),
            model = %self.model(),
            commands = result.commands.len(),
            confidence = result.confidence,
            estimated_usage = usage.estimated,
            "parsed model reply"
        );
        Ok(result)
    }

    /// True when the probe succeeds within [`HEALTH_TIMEOUT`]. Never errors;
    /// an unreachable backend is simply unhealthy.
    async fn health_check(&self) -> bool {
        match tokio::time::timeout(HEALTH_TIMEOUT, self.probe()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(provider = %self.kind(), error = %e, "health probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(provider = %self.kind(), "health probe timed out");
                false
            }
        }
    }
}

/// Characters/4 fallback when the backend reports no accounting fields.
fn estimate_usage(messages: &[ChatTurn], reply: &str) -> TokenUsage {
    let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
    TokenUsage::estimated(
        prompt_chars.div_ceil(4) as u32,
        reply.len().div_ceil(4) as u32,
    )
}
