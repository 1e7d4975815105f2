//! Assemble the message list for a generation request.

use tw_core::chat::ChatTurn;
use tw_core::parse::ParseContext;

// ============================================================
// System Prompt for Command Generation
// ============================================================

pub const SYSTEM_PROMPT: &str = r##"You are Testwright, an AI that converts natural-language test descriptions into structured browser commands.

## Output Format

Respond with a JSON object following this schema:
```json
{
  "commands": [
    {"type": "navigate", "value": "https://example.com/login", "description": "Go to the login page"},
    {"type": "fill", "selector": "#email", "value": "user@example.com", "description": "Enter the email address"},
    {"type": "click", "selector": "text=Log in", "description": "Submit the login form"}
  ],
  "confidence": 0.9
}
```

## Available Commands

- navigate: Open a URL. Required: value (the URL).
- click: Click an element. Required: selector.
- type: Type text into an element key by key. Required: selector, value.
- fill: Clear an input and set its value. Required: selector, value.
- assert: Check page state. With selector and value: element contains text. With selector only: element is visible. With value only: current URL matches.
- wait: Wait for an element (selector) or a number of seconds (value).
- screenshot: Capture the full page, or one element when selector is set. Optional: value (file name).
- select: Choose an option in a dropdown. Required: selector, value.
- hover: Hover over an element. Required: selector.
- press: Press a keyboard key. Required: value (key name, e.g. "Enter").

## Selectors

Prefer user-visible selectors: text=Log in, placeholder=Email, role-based selectors. Fall back to CSS (#id, .class) only when nothing user-visible identifies the element.

## Clarification

If the description is ambiguous or missing a required detail, respond instead with:
```json
{
  "questionnaire": {
    "message": "Short explanation of what is unclear",
    "questions": [
      {"id": "q1", "text": "The question", "type": "single-choice", "required": true, "options": ["first option", "second option"]}
    ]
  },
  "confidence": 0.3
}
```
Question types: single-choice, multi-choice, text-input.

## Rules

1. Return ONLY the JSON object, no markdown code blocks or explanations.
2. Keep commands in execution order.
3. Give every command a short description of its intent.
4. Set confidence between 0.0 and 1.0 reflecting how certain you are the commands match the request.
5. Never invent URLs, credentials or element names; ask via questionnaire instead.
"##;

/// Build the wire-ready message list: system instruction, prior turns,
/// a synthetic assistant turn carrying previously accepted commands, then
/// the new user message with any metadata appended.
///
/// Pure: the same input and context always produce the same list. History
/// is inserted verbatim; trimming to the token budget happens before this.
pub fn build_messages(input: &str, context: &ParseContext) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(context.history.len() + 3);
    messages.push(ChatTurn::system(SYSTEM_PROMPT));
    messages.extend(context.history.iter().cloned());

    if !context.previous_commands.is_empty() {
        let serialized =
            serde_json::to_string_pretty(&context.previous_commands).unwrap_or_default();
        messages.push(ChatTurn::assistant(format!(
            "Commands generated so far:\n{}",
            serialized
        )));
    }

    messages.push(ChatTurn::user(user_content(input, context)));
    messages
}

/// The user message body: the request itself, plus metadata lines in
/// sorted-key order so repeated builds are identical.
fn user_content(input: &str, context: &ParseContext) -> String {
    if context.metadata.is_empty() {
        return input.to_string();
    }
    let mut keys: Vec<&String> = context.metadata.keys().collect();
    keys.sort();
    let mut content = String::from(input);
    content.push_str("\n\nContext:");
    for key in keys {
        content.push_str(&format!("\n- {}: {}", key, context.metadata[key]));
    }
    content
}
