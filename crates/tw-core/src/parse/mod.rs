//! Parse inputs and outcomes: what goes into a generation request and the
//! three-way classification of what came back.

use crate::chat::ChatTurn;
use crate::command::Command;
use crate::provider::{GenerationOverrides, TokenUsage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// ParseContext
// ---------------------------------------------------------------------------

/// Optional context accompanying a natural-language request. All fields
/// default to empty; a bare prompt is a valid request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseContext {
    /// Commands from the previous round, included when the user is refining
    /// an earlier result ("now also check the error message").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_commands: Vec<Command>,
    /// Prior conversation turns, oldest first. The windower trims these to
    /// the model's budget before they reach the wire.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatTurn>,
    /// Free-form key/value hints (page URL, app name) surfaced to the model.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<GenerationOverrides>,
}

impl ParseContext {
    pub fn with_history(history: Vec<ChatTurn>) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Questionnaire
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice,
    MultiChoice,
    TextInput,
}

/// One clarifying question the model wants answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    /// Choices for the choice kinds; ignored for text input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiline: Option<bool>,
}

/// The model's request for clarification instead of (or alongside) commands.
/// This is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    /// Explanation shown to the user before the questions.
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
}

impl Questionnaire {
    /// A questionnaire with a single free-text question, used when the model
    /// expressed low confidence without asking anything specific.
    pub fn rephrase(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            questions: vec![Question {
                id: "clarification".to_string(),
                text: "Could you describe the steps in more detail?".to_string(),
                kind: QuestionKind::TextInput,
                required: true,
                options: None,
                placeholder: Some("e.g. go to /login, fill in both fields, press submit".to_string()),
                multiline: Some(true),
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// ParseResult
// ---------------------------------------------------------------------------

/// Everything extracted from one model reply, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub commands: Vec<Command>,
    /// Model self-assessment in [0, 1]. Defaults to 0.8 when the reply
    /// omitted it.
    pub confidence: f64,
    /// The verbatim reply text, kept for diagnostics and persistence.
    pub raw_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questionnaire: Option<Questionnaire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Estimated cost in USD for this call, when pricing is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// What the caller should do with a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyClassification {
    /// Commands to validate and hand onward.
    Commands(Vec<Command>),
    /// Relay the questions back to the user; no commands this round.
    NeedsClarification(Questionnaire),
    /// No commands and no questions. Callers should surface this as an
    /// anomaly rather than silently treating it as an empty test.
    Empty,
}

impl ParseResult {
    pub const DEFAULT_CONFIDENCE: f64 = 0.8;

    /// Classify this reply. An explicit questionnaire always wins; otherwise
    /// confidence below `threshold` becomes a request to rephrase (with a
    /// synthesized questionnaire when the model sent none), because acting
    /// on a guess produces tests that fail for the wrong reason. Only a
    /// confident reply with no commands is reported as empty.
    pub fn classify(&self, threshold: f64) -> ReplyClassification {
        if let Some(q) = &self.questionnaire {
            return ReplyClassification::NeedsClarification(q.clone());
        }
        if self.confidence < threshold {
            return ReplyClassification::NeedsClarification(Questionnaire::rephrase(format!(
                "I wasn't sure how to interpret that (confidence {:.2}).",
                self.confidence
            )));
        }
        if self.commands.is_empty() {
            return ReplyClassification::Empty;
        }
        ReplyClassification::Commands(self.commands.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandKind};

    fn result_with(commands: Vec<Command>, confidence: f64) -> ParseResult {
        ParseResult {
            commands,
            confidence,
            raw_response: String::new(),
            questionnaire: None,
            usage: None,
            cost: None,
        }
    }

    #[test]
    fn confident_commands_pass_through() {
        let result = result_with(vec![Command::new(CommandKind::Click)], 0.9);
        match result.classify(0.5) {
            ReplyClassification::Commands(cmds) => assert_eq!(cmds.len(), 1),
            other => panic!("expected commands, got {:?}", other),
        }
    }

    #[test]
    fn questionnaire_wins_over_commands() {
        let mut result = result_with(vec![Command::new(CommandKind::Click)], 0.9);
        result.questionnaire = Some(Questionnaire {
            message: "Which button?".into(),
            questions: vec![],
        });
        assert!(matches!(
            result.classify(0.5),
            ReplyClassification::NeedsClarification(_)
        ));
    }

    #[test]
    fn low_confidence_asks_to_rephrase() {
        let result = result_with(vec![Command::new(CommandKind::Click)], 0.2);
        match result.classify(0.5) {
            ReplyClassification::NeedsClarification(q) => {
                assert!(!q.questions.is_empty());
            }
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[test]
    fn nothing_at_all_is_empty() {
        let result = result_with(vec![], 0.9);
        assert!(matches!(result.classify(0.5), ReplyClassification::Empty));
    }

    #[test]
    fn empty_with_low_confidence_synthesizes_a_questionnaire() {
        let result = result_with(vec![], 0.2);
        match result.classify(0.5) {
            ReplyClassification::NeedsClarification(q) => {
                assert!(q.message.contains("0.20"));
            }
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[test]
    fn question_kind_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&QuestionKind::SingleChoice).unwrap(),
            "\"single-choice\""
        );
        let kind: QuestionKind = serde_json::from_str("\"text-input\"").unwrap();
        assert_eq!(kind, QuestionKind::TextInput);
    }
}
