//! Per-kind required-field checks over a command list, first violation wins.

use crate::CompileError;
use tw_core::command::{Command, CommandKind};

/// Check every command against its kind's required fields.
///
/// The contract:
/// - navigate needs `value` (the URL)
/// - click and hover need `selector`
/// - fill, type and select need `selector` and `value`
/// - wait needs `selector` or `value` (element wait vs timed wait)
/// - press needs `value` (the key name)
/// - assert and screenshot have no required fields
/// - unmapped kinds pass, so newer model output degrades downstream
///   instead of failing here
pub fn validate(commands: &[Command]) -> Result<(), CompileError> {
    for (index, command) in commands.iter().enumerate() {
        match &command.kind {
            CommandKind::Navigate => require_value(index, command)?,
            CommandKind::Click | CommandKind::Hover => require_selector(index, command)?,
            CommandKind::Fill | CommandKind::Type | CommandKind::Select => {
                require_selector(index, command)?;
                require_value(index, command)?;
            }
            CommandKind::Wait => {
                if is_blank(&command.selector) && is_blank(&command.value) {
                    return Err(missing(index, command, "selector or value"));
                }
            }
            CommandKind::Press => require_value(index, command)?,
            CommandKind::Assert | CommandKind::Screenshot | CommandKind::Other(_) => {}
        }
    }
    Ok(())
}

fn require_selector(index: usize, command: &Command) -> Result<(), CompileError> {
    if is_blank(&command.selector) {
        return Err(missing(index, command, "selector"));
    }
    Ok(())
}

fn require_value(index: usize, command: &Command) -> Result<(), CompileError> {
    if is_blank(&command.value) {
        return Err(missing(index, command, "value"));
    }
    Ok(())
}

/// Whitespace-only strings count as missing.
fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn missing(index: usize, command: &Command, field: &'static str) -> CompileError {
    CompileError::MissingField {
        index,
        kind: command.kind.to_string(),
        field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(kind: CommandKind, selector: Option<&str>, value: Option<&str>) -> Command {
        Command {
            selector: selector.map(String::from),
            value: value.map(String::from),
            ..Command::new(kind)
        }
    }

    #[test]
    fn full_valid_list_passes() {
        let commands = vec![
            cmd(CommandKind::Navigate, None, Some("https://example.com")),
            cmd(CommandKind::Click, Some("text=Login"), None),
            cmd(CommandKind::Fill, Some("#email"), Some("me@example.com")),
            cmd(CommandKind::Type, Some("#search"), Some("widgets")),
            cmd(CommandKind::Select, Some("#country"), Some("NZ")),
            cmd(CommandKind::Hover, Some(".menu"), None),
            cmd(CommandKind::Wait, Some(".spinner"), None),
            cmd(CommandKind::Wait, None, Some("2")),
            cmd(CommandKind::Press, None, Some("Enter")),
            cmd(CommandKind::Assert, None, None),
            cmd(CommandKind::Screenshot, None, None),
        ];
        assert!(validate(&commands).is_ok());
    }

    #[test]
    fn navigate_needs_value() {
        let err = validate(&[cmd(CommandKind::Navigate, None, None)]).unwrap_err();
        match err {
            CompileError::MissingField { index, kind, field } => {
                assert_eq!(index, 0);
                assert_eq!(kind, "navigate");
                assert_eq!(field, "value");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn click_needs_selector() {
        let err = validate(&[cmd(CommandKind::Click, None, Some("ignored"))]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::MissingField { field: "selector", .. }
        ));
    }

    #[test]
    fn fill_needs_both() {
        assert!(validate(&[cmd(CommandKind::Fill, Some("#email"), None)]).is_err());
        assert!(validate(&[cmd(CommandKind::Fill, None, Some("x"))]).is_err());
        assert!(validate(&[cmd(CommandKind::Fill, Some("#email"), Some("x"))]).is_ok());
    }

    #[test]
    fn wait_needs_one_of_selector_or_value() {
        let err = validate(&[cmd(CommandKind::Wait, None, None)]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::MissingField { field: "selector or value", .. }
        ));
    }

    #[test]
    fn whitespace_counts_as_missing() {
        let err = validate(&[cmd(CommandKind::Click, Some("   "), None)]).unwrap_err();
        assert!(matches!(err, CompileError::MissingField { .. }));
    }

    #[test]
    fn violation_reports_position_in_list() {
        let commands = vec![
            cmd(CommandKind::Navigate, None, Some("https://example.com")),
            cmd(CommandKind::Press, None, None),
        ];
        let err = validate(&commands).unwrap_err();
        assert!(matches!(err, CompileError::MissingField { index: 1, .. }));
    }

    #[test]
    fn unknown_kind_passes() {
        let commands = vec![cmd(CommandKind::Other("drag".into()), None, None)];
        assert!(validate(&commands).is_ok());
    }

    #[test]
    fn extra_fields_are_accepted() {
        let mut command = cmd(CommandKind::Click, Some("text=Login"), None);
        command.description = Some("log in".into());
        command.options = serde_json::json!({"force": true})
            .as_object()
            .cloned();
        assert!(validate(&[command]).is_ok());
    }
}
