//! Browser command schema: the structured steps the model is asked to emit.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// The closed set of browser actions the pipeline understands.
///
/// `Other` carries a kind string this build does not map. It survives
/// parsing and validation so the code generator can degrade it to a comment
/// line instead of failing the whole request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Navigate,
    Click,
    Type,
    Fill,
    Assert,
    Wait,
    Screenshot,
    Select,
    Hover,
    Press,
    Other(String),
}

impl CommandKind {
    /// All kinds with a defined required-field contract and code template.
    pub const KNOWN: [CommandKind; 10] = [
        CommandKind::Navigate,
        CommandKind::Click,
        CommandKind::Type,
        CommandKind::Fill,
        CommandKind::Assert,
        CommandKind::Wait,
        CommandKind::Screenshot,
        CommandKind::Select,
        CommandKind::Hover,
        CommandKind::Press,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::Navigate => "navigate",
            CommandKind::Click => "click",
            CommandKind::Type => "type",
            CommandKind::Fill => "fill",
            CommandKind::Assert => "assert",
            CommandKind::Wait => "wait",
            CommandKind::Screenshot => "screenshot",
            CommandKind::Select => "select",
            CommandKind::Hover => "hover",
            CommandKind::Press => "press",
            CommandKind::Other(s) => s,
        }
    }

    /// Kinds that act on a page element and therefore need a selector.
    pub fn targets_element(&self) -> bool {
        matches!(
            self,
            CommandKind::Click
                | CommandKind::Fill
                | CommandKind::Type
                | CommandKind::Select
                | CommandKind::Hover
        )
    }
}

impl From<&str> for CommandKind {
    fn from(s: &str) -> Self {
        match s {
            "navigate" => CommandKind::Navigate,
            "click" => CommandKind::Click,
            "type" => CommandKind::Type,
            "fill" => CommandKind::Fill,
            "assert" => CommandKind::Assert,
            "wait" => CommandKind::Wait,
            "screenshot" => CommandKind::Screenshot,
            "select" => CommandKind::Select,
            "hover" => CommandKind::Hover,
            "press" => CommandKind::Press,
            other => CommandKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CommandKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(CommandKind::from(s.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One browser-automation step. Produced only by the response parser from
/// model output; immutable once validated. Sequence order is execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: CommandKind,

    /// Target element, e.g. "text=Login" or "#email".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// URL, input text, expected text, duration in seconds, or key name,
    /// depending on the kind. Models occasionally emit numbers here, so
    /// deserialization accepts scalars and stringifies them.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_loose_string"
    )]
    pub value: Option<String>,

    /// Free-form per-command options, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Map<String, serde_json::Value>>,

    /// Human-readable intent, echoed into the generated script as a comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Command {
    /// A command of the given kind with every optional field unset.
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            selector: None,
            value: None,
            options: None,
            description: None,
        }
    }

    /// Duration in seconds when `value` holds one (used by wait).
    pub fn value_as_seconds(&self) -> Option<f64> {
        self.value.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

/// Accept a JSON string, number, or bool and carry it as a string.
fn de_loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in CommandKind::KNOWN {
            assert_eq!(CommandKind::from(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind = CommandKind::from("drag");
        assert_eq!(kind, CommandKind::Other("drag".into()));
        assert_eq!(kind.as_str(), "drag");
    }

    #[test]
    fn deserialize_with_numeric_value() {
        let cmd: Command = serde_json::from_str(r#"{"type": "wait", "value": 3}"#).unwrap();
        assert_eq!(cmd.kind, CommandKind::Wait);
        assert_eq!(cmd.value.as_deref(), Some("3"));
        assert_eq!(cmd.value_as_seconds(), Some(3.0));
    }

    #[test]
    fn serialize_uses_type_field() {
        let cmd = Command {
            selector: Some("text=Login".into()),
            ..Command::new(CommandKind::Click)
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "click");
        assert_eq!(json["selector"], "text=Login");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn element_kinds() {
        assert!(CommandKind::Click.targets_element());
        assert!(CommandKind::Hover.targets_element());
        assert!(!CommandKind::Navigate.targets_element());
        assert!(!CommandKind::Screenshot.targets_element());
    }
}
