//! Model context-window sizes.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Used when a model is not in the table. Small on purpose: overshooting a
/// context window fails the request, undershooting only trims history.
pub const DEFAULT_CONTEXT_LIMIT: usize = 8_192;

fn limit_table() -> &'static HashMap<&'static str, usize> {
    static LIMITS: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    LIMITS.get_or_init(|| {
        let mut m = HashMap::new();

        // OpenAI
        m.insert("gpt-4o", 128_000);
        m.insert("gpt-4o-mini", 128_000);
        m.insert("gpt-4-turbo", 128_000);
        m.insert("gpt-4", 8_192);
        m.insert("gpt-3.5-turbo", 16_385);
        m.insert("o1", 200_000);
        m.insert("o3-mini", 200_000);

        // Anthropic
        m.insert("claude-3-opus", 200_000);
        m.insert("claude-3-sonnet", 200_000);
        m.insert("claude-3-haiku", 200_000);
        m.insert("claude-3-5-sonnet", 200_000);
        m.insert("claude-3-5-haiku", 200_000);

        // Common Ollama-hosted models
        m.insert("llama3.1", 128_000);
        m.insert("llama3", 8_192);
        m.insert("llama2", 4_096);
        m.insert("mistral", 32_000);
        m.insert("qwen2.5", 32_000);
        m.insert("codellama", 16_384);

        m
    })
}

/// Look up the context limit for a model name. Exact match first, then the
/// longest table key the name starts with (covers date-suffixed releases
/// like `gpt-4o-2024-08-06` and tagged Ollama names like `llama3:8b`).
pub fn context_limit_for(model: &str) -> usize {
    let table = limit_table();
    if let Some(&limit) = table.get(model) {
        return limit;
    }

    let lower = model.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for (&name, &limit) in table.iter() {
        if lower.starts_with(name) {
            match best {
                Some((prev, _)) if prev.len() >= name.len() => {}
                _ => best = Some((name, limit)),
            }
        }
    }
    match best {
        Some((_, limit)) => limit,
        None => DEFAULT_CONTEXT_LIMIT,
    }
}
