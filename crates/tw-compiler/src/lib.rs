//! tw-compiler: Command list → Playwright test script
//!
//! Pipeline: Validator → CodeGenerator
//! Validation enforces the per-kind required-field contract; generation is a
//! pure, deterministic rendering of the validated list.

pub mod codegen;
pub mod validate;

pub use codegen::CompileOptions;

use thiserror::Error;
use tw_core::command::Command;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("command {index} ({kind}): missing required field '{field}'")]
    MissingField {
        index: usize,
        kind: String,
        field: &'static str,
    },
    #[error("no commands to compile")]
    NoCommands,
}

/// Validate a command list and render it as a Playwright TypeScript test.
pub fn compile(commands: &[Command], options: &CompileOptions) -> Result<String, CompileError> {
    if commands.is_empty() {
        return Err(CompileError::NoCommands);
    }
    validate::validate(commands)?;
    let script = codegen::generate(commands, options);
    tracing::debug!(steps = commands.len(), "compiled command list to script");
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_core::command::{Command, CommandKind};

    #[test]
    fn empty_list_is_refused() {
        assert!(matches!(
            compile(&[], &CompileOptions::default()),
            Err(CompileError::NoCommands)
        ));
    }

    #[test]
    fn invalid_command_stops_compilation() {
        // click without a selector
        let commands = vec![Command::new(CommandKind::Click)];
        let err = compile(&commands, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::MissingField { index: 0, .. }));
    }

    #[test]
    fn valid_list_compiles() {
        let mut navigate = Command::new(CommandKind::Navigate);
        navigate.value = Some("https://example.com".into());
        let script = compile(&[navigate], &CompileOptions::default()).unwrap();
        assert!(script.contains("page.goto('https://example.com')"));
    }
}
