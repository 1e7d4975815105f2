//! Saved test suites, the durable output of a successful generation.

use crate::command::Command;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One saved, versioned test. Saving under an existing name creates the next
/// version rather than overwriting; versions are immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: Uuid,
    pub name: String,
    /// Monotonic per name, starting at 1.
    pub version: u32,
    /// The natural-language description that produced this suite.
    pub nlp_input: String,
    /// The validated commands, replayable without re-generation.
    pub commands: Vec<Command>,
    /// The rendered automation script.
    pub generated_code: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub created_at: DateTime<Utc>,
    /// Bumped when the stored script is edited after generation.
    pub updated_at: DateTime<Utc>,
}

impl TestSuite {
    pub fn new(
        name: impl Into<String>,
        version: u32,
        nlp_input: impl Into<String>,
        commands: Vec<Command>,
        generated_code: impl Into<String>,
        llm_provider: impl Into<String>,
        llm_model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version,
            nlp_input: nlp_input.into(),
            commands,
            generated_code: generated_code.into(),
            llm_provider: llm_provider.into(),
            llm_model: llm_model.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandKind};

    #[test]
    fn suite_round_trips_through_json() {
        let suite = TestSuite::new(
            "login",
            1,
            "test the login flow",
            vec![Command::new(CommandKind::Navigate)],
            "// generated",
            "openai",
            "gpt-4o",
        );
        let json = serde_json::to_string(&suite).unwrap();
        let back: TestSuite = serde_json::from_str(&json).unwrap();
        assert_eq!(back, suite);
    }
}
