//! tw-context: Conversation history windowing under a token budget
//!
//! Before a request goes to a provider, prior chat turns are trimmed so that
//! system prompt + history + new message stay inside the share of the model's
//! context window reserved for input. Selection is greedy from the newest
//! turn backwards; the kept turns are returned in chronological order.
//!
//! Token counting uses tiktoken for OpenAI-family models and falls back to a
//! characters/4 estimate elsewhere. The two accuracy classes are surfaced as
//! [`CounterMode`] so callers can tell which one produced a count.

pub mod limits;

use tiktoken_rs::{get_bpe_from_model, CoreBPE};
use tw_core::chat::ChatTurn;

/// Share of the context window reserved for input; the rest is left for the
/// model's reply.
pub const INPUT_SHARE: f64 = 0.6;

/// Serialization overhead added per history message.
pub const TOKENS_PER_MESSAGE: usize = 4;

/// How token counts are produced for the configured model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMode {
    /// Real BPE counts via tiktoken.
    Exact,
    /// Characters divided by four, rounded up.
    Estimated,
}

impl CounterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterMode::Exact => "exact",
            CounterMode::Estimated => "estimated",
        }
    }
}

/// The windowed history plus the numbers that produced it.
#[derive(Debug, Clone)]
pub struct WindowResult {
    /// Accepted turns, oldest first. Always a suffix of the input history.
    pub turns: Vec<ChatTurn>,
    /// Tokens consumed by the accepted turns, overhead included.
    pub token_count: usize,
    /// Turns dropped from the front of the history.
    pub dropped: usize,
    /// The budget the turns were fitted into.
    pub budget: usize,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ContextWindowerBuilder {
    model: Option<String>,
    context_limit: Option<usize>,
}

impl ContextWindowerBuilder {
    /// Model name; drives both the context-limit lookup and tokenizer choice.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Explicit context limit, overriding the model table.
    pub fn context_limit(mut self, limit: usize) -> Self {
        self.context_limit = Some(limit);
        self
    }

    pub fn build(self) -> ContextWindower {
        let model = self.model.unwrap_or_else(|| "gpt-4".to_string());
        let context_limit = self
            .context_limit
            .unwrap_or_else(|| limits::context_limit_for(&model));
        let encoder = get_bpe_from_model(&model).ok();
        ContextWindower {
            model,
            context_limit,
            encoder,
        }
    }
}

// ---------------------------------------------------------------------------
// ContextWindower
// ---------------------------------------------------------------------------

pub struct ContextWindower {
    model: String,
    context_limit: usize,
    /// None for non-OpenAI models; counting then estimates.
    encoder: Option<CoreBPE>,
}

impl std::fmt::Debug for ContextWindower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextWindower")
            .field("model", &self.model)
            .field("context_limit", &self.context_limit)
            .field("counter_mode", &self.counter_mode())
            .finish()
    }
}

impl ContextWindower {
    pub fn builder() -> ContextWindowerBuilder {
        ContextWindowerBuilder::default()
    }

    pub fn for_model(model: impl Into<String>) -> Self {
        Self::builder().model(model).build()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn context_limit(&self) -> usize {
        self.context_limit
    }

    pub fn counter_mode(&self) -> CounterMode {
        if self.encoder.is_some() {
            CounterMode::Exact
        } else {
            CounterMode::Estimated
        }
    }

    /// Tokens available for input (system prompt + history + new message).
    pub fn max_input_tokens(&self) -> usize {
        (self.context_limit as f64 * INPUT_SHARE).floor() as usize
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        match &self.encoder {
            Some(encoder) => encoder.encode_with_special_tokens(text).len(),
            None => text.len().div_ceil(4),
        }
    }

    /// Fit `history` into the budget left after the system prompt and the
    /// new user message. Turns are taken newest-first until the next one
    /// would overflow, then returned oldest-first.
    pub fn window(
        &self,
        system_prompt: &str,
        current_message: &str,
        history: &[ChatTurn],
    ) -> WindowResult {
        let reserved =
            self.count_tokens(system_prompt) + self.count_tokens(current_message);
        let budget = self.max_input_tokens().saturating_sub(reserved);

        let mut accepted: Vec<&ChatTurn> = Vec::new();
        let mut token_count = 0usize;
        for turn in history.iter().rev() {
            let cost = self.count_tokens(&turn.content) + TOKENS_PER_MESSAGE;
            if token_count + cost > budget {
                break;
            }
            token_count += cost;
            accepted.push(turn);
        }
        accepted.reverse();

        let dropped = history.len() - accepted.len();
        if dropped > 0 {
            tracing::debug!(
                model = %self.model,
                dropped,
                kept = accepted.len(),
                budget,
                counter = self.counter_mode().as_str(),
                "trimmed conversation history to fit context budget"
            );
        }

        WindowResult {
            turns: accepted.into_iter().cloned().collect(),
            token_count,
            dropped,
            budget,
        }
    }
}
