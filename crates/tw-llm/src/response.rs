//! Extract a typed [`ParseResult`] from raw model text.
//!
//! Models are instructed to answer with bare JSON but routinely wrap it in
//! markdown fences anyway, so extraction runs ordered strategies: the
//! interior of a ```json (or bare ```) fence first, then the whole text.
//! Anything that survives neither is a parse failure carrying the raw text.

use crate::LlmError;
use serde::Deserialize;
use tw_core::command::Command;
use tw_core::parse::{ParseResult, Questionnaire};

/// The shape the model is asked to emit. Everything is optional at this
/// boundary; classification of what's missing happens downstream.
#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    commands: Vec<Command>,
    confidence: Option<f64>,
    questionnaire: Option<Questionnaire>,
}

/// Parse one model reply.
pub fn parse_reply(raw: &str) -> Result<ParseResult, LlmError> {
    let mut last_error = String::new();
    for candidate in candidates(raw) {
        match serde_json::from_str::<RawReply>(candidate) {
            Ok(reply) => {
                return Ok(ParseResult {
                    commands: reply.commands,
                    confidence: reply
                        .confidence
                        .unwrap_or(ParseResult::DEFAULT_CONFIDENCE)
                        .clamp(0.0, 1.0),
                    raw_response: raw.to_string(),
                    questionnaire: reply.questionnaire,
                    usage: None,
                    cost: None,
                });
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(LlmError::ResponseParse {
        message: last_error,
        raw: raw.to_string(),
    })
}

/// Extraction candidates in priority order: fenced interior, then the
/// trimmed whole text. Duplicates are skipped so each string is parsed once.
fn candidates(raw: &str) -> Vec<&str> {
    let whole = raw.trim();
    let mut out = Vec::with_capacity(2);
    if let Some(inner) = fenced_block(raw) {
        out.push(inner);
    }
    if out.last() != Some(&whole) {
        out.push(whole);
    }
    out
}

fn fenced_block(raw: &str) -> Option<&str> {
    if raw.contains("```json") {
        raw.split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(str::trim)
    } else if raw.contains("```") {
        raw.split("```").nth(1).map(str::trim)
    } else {
        None
    }
}
