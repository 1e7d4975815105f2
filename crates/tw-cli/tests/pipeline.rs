//! End-to-end pipeline tests: scripted adapters, an in-memory store, and the
//! real prompt/window/parse/compile path in between.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tw_cli::{GenerateOptions, GenerateOutcome, Pipeline, PipelineError, Settings};
use tw_core::chat::{ChatSession, ChatTurn, Role};
use tw_core::command::CommandKind;
use tw_core::provider::{GenerationParams, ProviderConfig, ProviderKind, TokenUsage};
use tw_llm::{AdapterRouter, Completion, CostLedger, LlmError, ProviderAdapter};
use tw_store::Store;

/// Canned backend: a fixed reply, and every request body captured for
/// inspection.
struct ScriptedAdapter {
    config: ProviderConfig,
    ledger: Option<Arc<CostLedger>>,
    reply: Result<String, String>,
    requests: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedAdapter {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o"),
            ledger: None,
            reply: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn replying_with_ledger(reply: &str, ledger: Arc<CostLedger>) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o"),
            ledger: Some(ledger),
            reply: Ok(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            config: ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o"),
            ledger: None,
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Vec<ChatTurn>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn ledger(&self) -> Option<&CostLedger> {
        self.ledger.as_deref()
    }

    async fn complete(
        &self,
        messages: &[ChatTurn],
        _params: GenerationParams,
    ) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Ok(text) => Ok(Completion {
                text: text.clone(),
                usage: Some(TokenUsage::new(50, 20)),
            }),
            Err(message) => Err(LlmError::Unavailable {
                provider: self.config.kind.to_string(),
                message: message.clone(),
            }),
        }
    }

    async fn probe(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

fn pipeline_with(adapter: Arc<ScriptedAdapter>) -> Pipeline {
    let store = Store::in_memory().unwrap();
    let router = AdapterRouter::new(adapter, Vec::new());
    Pipeline::with_parts(Settings::default(), store, router, CostLedger::new())
}

const LOGIN_REPLY: &str = r##"{
    "commands": [
        {"type": "navigate", "value": "https://example.com", "description": "Open the landing page"},
        {"type": "click", "selector": "#login", "description": "Press the login button"}
    ],
    "confidence": 0.9
}"##;

#[tokio::test]
async fn description_becomes_commands_and_a_script() {
    let adapter = ScriptedAdapter::replying(LOGIN_REPLY);
    let pipeline = pipeline_with(adapter);
    let session = ChatSession::new();

    let outcome = pipeline
        .generate(
            &session,
            "Go to example.com and log in",
            &GenerateOptions::default(),
        )
        .await
        .unwrap();

    let GenerateOutcome::Generated(done) = outcome else {
        panic!("expected commands, got {outcome:?}");
    };
    assert_eq!(done.commands.len(), 2);
    assert_eq!(done.commands[0].kind, CommandKind::Navigate);
    assert_eq!(done.commands[1].kind, CommandKind::Click);
    assert!((done.confidence - 0.9).abs() < f64::EPSILON);

    // the script keeps command order and carries descriptions as comments
    assert!(done
        .script
        .starts_with("import { test, expect } from '@playwright/test';"));
    let goto = done.script.find("page.goto('https://example.com')").unwrap();
    let click = done.script.find("page.locator('#login').click()").unwrap();
    assert!(goto < click);
    assert!(done.script.contains("// Open the landing page"));
    assert!(done.script.contains("// Press the login button"));

    // nothing is saved without a suite name
    assert!(done.suite.is_none());
    assert!(pipeline.store().list_suites().unwrap().is_empty());
}

#[tokio::test]
async fn named_results_are_saved_and_versioned() {
    let adapter = ScriptedAdapter::replying(LOGIN_REPLY);
    let pipeline = pipeline_with(adapter);
    let session = ChatSession::new();
    let options = GenerateOptions {
        suite_name: Some("login flow".into()),
        ..Default::default()
    };

    let first = pipeline.generate(&session, "Log in", &options).await.unwrap();
    let second = pipeline
        .generate(&session, "Log in, checking the banner", &options)
        .await
        .unwrap();

    let version = |outcome: &GenerateOutcome| match outcome {
        GenerateOutcome::Generated(done) => done.suite.as_ref().unwrap().version,
        other => panic!("expected commands, got {other:?}"),
    };
    assert_eq!(version(&first), 1);
    assert_eq!(version(&second), 2);

    let latest = pipeline.store().latest_suite("login flow").unwrap().unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.nlp_input, "Log in, checking the banner");
    assert!(latest.generated_code.contains("test('login flow'"));
}

#[tokio::test]
async fn questionnaire_wins_even_over_confident_commands() {
    let reply = r#"{
        "commands": [{"type": "navigate", "value": "https://example.com"}],
        "confidence": 0.95,
        "questionnaire": {
            "message": "Which account should the test use?",
            "questions": [
                {"id": "account", "text": "Pick an account type", "type": "single-choice",
                 "required": true, "options": ["admin", "guest"]}
            ]
        }
    }"#;
    let adapter = ScriptedAdapter::replying(reply);
    let pipeline = pipeline_with(adapter);
    let session = ChatSession::new();
    let options = GenerateOptions {
        suite_name: Some("login".into()),
        ..Default::default()
    };

    let outcome = pipeline.generate(&session, "Log in", &options).await.unwrap();
    let GenerateOutcome::NeedsClarification(questionnaire) = outcome else {
        panic!("expected clarification, got {outcome:?}");
    };
    assert_eq!(questionnaire.message, "Which account should the test use?");
    assert_eq!(questionnaire.questions.len(), 1);

    // a clarification round stores no suite, even when a name was given
    assert!(pipeline.store().list_suites().unwrap().is_empty());
    // but the exchange is in the session history
    let messages = pipeline.store().recent_messages(session.id, 10).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::Assistant);
    assert_eq!(messages[0].content, "Which account should the test use?");
    assert_eq!(messages[1].role, Role::User);
}

#[tokio::test]
async fn low_confidence_empty_reply_asks_for_clarification() {
    let adapter = ScriptedAdapter::replying(r#"{"commands": [], "confidence": 0.2}"#);
    let pipeline = pipeline_with(adapter);
    let session = ChatSession::new();

    let outcome = pipeline
        .generate(&session, "do the thing", &GenerateOptions::default())
        .await
        .unwrap();
    let GenerateOutcome::NeedsClarification(questionnaire) = outcome else {
        panic!("expected clarification, got {outcome:?}");
    };
    assert!(!questionnaire.questions.is_empty());
}

#[tokio::test]
async fn refinement_carries_history_and_previous_commands() {
    let adapter = ScriptedAdapter::replying(LOGIN_REPLY);
    let pipeline = pipeline_with(adapter.clone());
    let session = ChatSession::new();

    pipeline
        .generate(&session, "Log in", &GenerateOptions::default())
        .await
        .unwrap();
    pipeline
        .generate(
            &session,
            "Also assert the dashboard greets me",
            &GenerateOptions::default(),
        )
        .await
        .unwrap();

    let requests = adapter.requests();
    assert_eq!(requests.len(), 2);

    // first round: system prompt plus the bare request
    assert_eq!(requests[0].len(), 2);

    // second round: the first exchange comes back as history, and the
    // accepted commands ride along as a synthetic assistant turn
    let second = &requests[1];
    assert_eq!(second[0].role, Role::System);
    assert!(second
        .iter()
        .any(|turn| turn.role == Role::User && turn.content == "Log in"));
    assert!(second
        .iter()
        .any(|turn| turn.content.contains("Commands generated so far")));
    assert_eq!(
        second.last().unwrap().content,
        "Also assert the dashboard greets me"
    );
}

#[tokio::test]
async fn provider_failure_keeps_the_user_message() {
    let adapter = ScriptedAdapter::failing("HTTP 503");
    let pipeline = pipeline_with(adapter);
    let session = ChatSession::new();

    let err = pipeline
        .generate(&session, "Log in", &GenerateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Llm(LlmError::Unavailable { .. })
    ));

    // the question survives for a retry; no assistant message was stored
    let messages = pipeline.store().recent_messages(session.id, 10).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn every_reply_with_usage_lands_in_the_cost_table() {
    let adapter = ScriptedAdapter::replying(LOGIN_REPLY);
    let pipeline = pipeline_with(adapter);
    let session = ChatSession::new();

    pipeline
        .generate(&session, "Log in", &GenerateOptions::default())
        .await
        .unwrap();
    pipeline
        .generate(&session, "Log in again", &GenerateOptions::default())
        .await
        .unwrap();

    let summary = pipeline.store().cost_summary().unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].provider, "openai");
    assert_eq!(summary[0].model, "gpt-4o");
    assert_eq!(summary[0].requests, 2);
    assert_eq!(summary[0].prompt_tokens, 100);
    assert_eq!(summary[0].completion_tokens, 40);
    // gpt-4o has known pricing, so spend is non-zero
    assert!(summary[0].cost_usd > 0.0);
}

#[tokio::test]
async fn in_process_ledger_sees_the_same_spend() {
    let ledger = CostLedger::new();
    let adapter = ScriptedAdapter::replying_with_ledger(LOGIN_REPLY, Arc::clone(&ledger));
    let store = Store::in_memory().unwrap();
    let router = AdapterRouter::new(adapter, Vec::new());
    let pipeline = Pipeline::with_parts(Settings::default(), store, router, ledger);
    let session = ChatSession::new();

    pipeline
        .generate(&session, "Log in", &GenerateOptions::default())
        .await
        .unwrap();
    pipeline
        .generate(&session, "Log in again", &GenerateOptions::default())
        .await
        .unwrap();

    let totals = pipeline.ledger().totals();
    assert_eq!(totals.requests, 2);
    assert_eq!(totals.prompt_tokens, 100);
    assert_eq!(totals.completion_tokens, 40);
    assert!(totals.cost_usd > 0.0);

    // Poll until the drain task has moved both records into history.
    for _ in 0..50 {
        if pipeline.ledger().recent().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let recent = pipeline.ledger().recent();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].provider, "openai");
    assert_eq!(recent[0].model, "gpt-4o");
}
