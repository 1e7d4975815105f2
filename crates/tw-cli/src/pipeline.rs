//! The generate pipeline: select a provider, window the conversation, parse
//! the reply, persist the exchange and compile commands into a script.
//!
//! Store writes follow request order. The user message lands before the
//! provider is called, so a failed call still leaves the question in the
//! session; the assistant message lands only once a reply classified
//! cleanly. Spend is recorded for every reply that reported usage, whether
//! or not it produced commands.

use crate::config::Settings;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tw_compiler::{CompileError, CompileOptions};
use tw_context::ContextWindower;
use tw_core::chat::{ChatMessage, ChatSession, ChatTurn, Role};
use tw_core::command::Command;
use tw_core::parse::{ParseContext, Questionnaire, ReplyClassification};
use tw_core::provider::{GenerationOverrides, TokenUsage};
use tw_core::suite::TestSuite;
use tw_llm::prompt;
use tw_llm::{AdapterRouter, CostLedger, LlmError};
use tw_store::{CostEntry, NewSuite, Store, StoreError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Knobs for one generate call.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Persist the result as a new suite version under this name.
    pub suite_name: Option<String>,
    pub overrides: Option<GenerationOverrides>,
}

/// A successful round trip: commands plus the script they compile to.
#[derive(Debug, Clone)]
pub struct Generated {
    pub commands: Vec<Command>,
    pub script: String,
    pub confidence: f64,
    pub provider: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub cost: Option<f64>,
    /// Present when the caller asked for the result to be saved.
    pub suite: Option<TestSuite>,
}

#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    Generated(Generated),
    /// The model wants more detail before committing to commands.
    NeedsClarification(Questionnaire),
    /// A confident reply with nothing in it. Surfaced, never saved.
    Empty,
}

pub struct Pipeline {
    settings: Settings,
    store: Store,
    router: AdapterRouter,
    ledger: Arc<CostLedger>,
}

impl Pipeline {
    /// Open the database and build every configured adapter. Must run inside
    /// a tokio runtime; the cost ledger spawns its drain task here.
    pub fn new(settings: Settings) -> Result<Self, PipelineError> {
        let database_path = settings.resolve_database_path();
        if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        let store = Store::open(&database_path)?;
        let ledger = CostLedger::new();
        let router = AdapterRouter::from_settings(&settings.router, Some(ledger.clone()))?;
        Ok(Self {
            settings,
            store,
            router,
            ledger,
        })
    }

    /// Assemble from pre-built parts. This is how tests and embedding hosts
    /// inject an in-memory store or scripted adapters.
    pub fn with_parts(
        settings: Settings,
        store: Store,
        router: AdapterRouter,
        ledger: Arc<CostLedger>,
    ) -> Self {
        Self {
            settings,
            store,
            router,
            ledger,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn router(&self) -> &AdapterRouter {
        &self.router
    }

    /// In-process spend totals for this pipeline's adapters.
    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    /// One natural-language round trip within a session.
    pub async fn generate(
        &self,
        session: &ChatSession,
        input: &str,
        options: &GenerateOptions,
    ) -> Result<GenerateOutcome, PipelineError> {
        let adapter = self.router.select().await;
        let windower = ContextWindower::for_model(adapter.model());

        self.store.ensure_session(session)?;
        let recent = self
            .store
            .recent_messages(session.id, self.settings.history_limit)?;
        // the newest stored commands seed the refinement context
        let previous_commands = recent
            .iter()
            .find_map(|m| m.commands.clone())
            .unwrap_or_default();
        let history: Vec<ChatTurn> = recent.iter().rev().map(ChatMessage::as_turn).collect();

        let window = windower.window(prompt::SYSTEM_PROMPT, input, &history);
        let context = ParseContext {
            previous_commands,
            history: window.turns,
            overrides: options.overrides,
            ..ParseContext::default()
        };

        self.store
            .append_message(&ChatMessage::new(session.id, Role::User, input))?;

        let result = adapter.parse(input, &context).await?;

        if let Some(usage) = result.usage {
            self.store.record_cost(&CostEntry {
                provider: adapter.kind().to_string(),
                model: adapter.model().to_string(),
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                cost_usd: result.cost,
                created_at: Utc::now(),
            })?;
        }

        match result.classify(self.settings.confidence_threshold) {
            ReplyClassification::Commands(commands) => {
                let compile_options = CompileOptions {
                    test_name: options
                        .suite_name
                        .clone()
                        .unwrap_or_else(|| "generated test".to_string()),
                    include_imports: true,
                };
                let script = tw_compiler::compile(&commands, &compile_options)?;

                let suite = match &options.suite_name {
                    Some(name) => Some(self.store.create_suite(NewSuite {
                        name: name.clone(),
                        nlp_input: input.to_string(),
                        commands: commands.clone(),
                        generated_code: script.clone(),
                        llm_provider: adapter.kind().to_string(),
                        llm_model: adapter.model().to_string(),
                    })?),
                    None => None,
                };

                self.store.append_message(
                    &ChatMessage::new(session.id, Role::Assistant, result.raw_response.clone())
                        .with_commands(commands.clone()),
                )?;

                Ok(GenerateOutcome::Generated(Generated {
                    commands,
                    script,
                    confidence: result.confidence,
                    provider: adapter.kind().to_string(),
                    model: adapter.model().to_string(),
                    usage: result.usage,
                    cost: result.cost,
                    suite,
                }))
            }
            ReplyClassification::NeedsClarification(questionnaire) => {
                self.store.append_message(&ChatMessage::new(
                    session.id,
                    Role::Assistant,
                    questionnaire.message.clone(),
                ))?;
                Ok(GenerateOutcome::NeedsClarification(questionnaire))
            }
            ReplyClassification::Empty => {
                tracing::warn!(
                    session = %session.id,
                    "model returned neither commands nor questions"
                );
                self.store.append_message(&ChatMessage::new(
                    session.id,
                    Role::Assistant,
                    result.raw_response.clone(),
                ))?;
                Ok(GenerateOutcome::Empty)
            }
        }
    }
}
