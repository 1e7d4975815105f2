//! Ordered replay with per-step timeouts and a step-by-step report.

use crate::engine::BrowserEngine;
use crate::RunnerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tw_core::command::{Command, CommandKind};

/// Default bound on a single step.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub step_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { step_timeout: DEFAULT_STEP_TIMEOUT }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: StepStatus,
    /// Failure message, or the reason a step was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Replay commands in order. The first failed step stops execution; the
/// remainder is reported as skipped, never silently dropped. Steps a real
/// browser could not act on (unknown kinds, nothing to wait for) are
/// skipped the same way the generated script comments them out.
pub async fn run_commands(
    engine: &dyn BrowserEngine,
    commands: &[Command],
    options: &RunOptions,
) -> RunReport {
    let started_at = Utc::now();
    let mut steps = Vec::with_capacity(commands.len());
    let (mut passed, mut failed, mut skipped) = (0usize, 0usize, 0usize);
    let mut halted = false;

    for (index, command) in commands.iter().enumerate() {
        let kind = command.kind.to_string();
        let description = command.description.clone();

        if halted {
            skipped += 1;
            steps.push(StepReport {
                index,
                kind,
                description,
                status: StepStatus::Skipped,
                error: Some("not run: an earlier step failed".into()),
                duration_ms: 0,
            });
            continue;
        }

        if let Some(reason) = skip_reason(command) {
            tracing::debug!(step = index, kind = %kind, reason = %reason, "skipping step");
            skipped += 1;
            steps.push(StepReport {
                index,
                kind,
                description,
                status: StepStatus::Skipped,
                error: Some(reason),
                duration_ms: 0,
            });
            continue;
        }

        let step_started = std::time::Instant::now();
        let outcome = with_timeout(options.step_timeout, dispatch(engine, index, command)).await;
        let duration_ms = step_started.elapsed().as_millis() as i64;

        match outcome {
            Ok(()) => {
                passed += 1;
                steps.push(StepReport {
                    index,
                    kind,
                    description,
                    status: StepStatus::Passed,
                    error: None,
                    duration_ms,
                });
            }
            Err(e) => {
                tracing::warn!(step = index, kind = %kind, error = %e, "step failed, halting replay");
                failed += 1;
                halted = true;
                steps.push(StepReport {
                    index,
                    kind,
                    description,
                    status: StepStatus::Failed,
                    error: Some(e.to_string()),
                    duration_ms,
                });
            }
        }
    }

    RunReport {
        total: commands.len(),
        passed,
        failed,
        skipped,
        steps,
        started_at,
        completed_at: Utc::now(),
    }
}

/// Wrap a step future with the per-step timeout.
async fn with_timeout<F>(limit: Duration, fut: F) -> Result<(), RunnerError>
where
    F: Future<Output = Result<(), RunnerError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RunnerError::Timeout(limit.as_millis() as u64)),
    }
}

/// Steps with no executable action. Mirrors the compiler, which renders
/// these as comments instead of failing the script.
fn skip_reason(command: &Command) -> Option<String> {
    let has_selector = command
        .selector
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    let has_value = command.value.as_deref().is_some_and(|v| !v.trim().is_empty());

    match &command.kind {
        CommandKind::Other(name) => Some(format!("unsupported command: {name}")),
        CommandKind::Navigate | CommandKind::Press if !has_value => Some("missing value".into()),
        CommandKind::Click | CommandKind::Hover if !has_selector => {
            Some("missing selector".into())
        }
        CommandKind::Type | CommandKind::Fill | CommandKind::Select
            if !has_selector || !has_value =>
        {
            Some("missing selector or value".into())
        }
        CommandKind::Wait if !has_selector && command.value_as_seconds().is_none() => {
            Some("nothing to wait for".into())
        }
        CommandKind::Assert if !has_selector && !has_value => Some("nothing to assert".into()),
        _ => None,
    }
}

async fn dispatch(
    engine: &dyn BrowserEngine,
    index: usize,
    command: &Command,
) -> Result<(), RunnerError> {
    let selector = command.selector.as_deref().filter(|s| !s.trim().is_empty());
    let value = command.value.as_deref().filter(|v| !v.trim().is_empty());

    match (&command.kind, selector, value) {
        (CommandKind::Navigate, _, Some(url)) => engine.navigate(url).await,
        (CommandKind::Click, Some(sel), _) => engine.click(sel).await,
        (CommandKind::Type, Some(sel), Some(val)) => engine.type_text(sel, val).await,
        (CommandKind::Fill, Some(sel), Some(val)) => engine.fill(sel, val).await,
        (CommandKind::Select, Some(sel), Some(val)) => engine.select(sel, val).await,
        (CommandKind::Hover, Some(sel), _) => engine.hover(sel).await,
        (CommandKind::Press, _, Some(key)) => engine.press(key).await,
        (CommandKind::Wait, Some(sel), _) => engine.wait(Some(sel), None).await,
        (CommandKind::Wait, None, _) => engine.wait(None, command.value_as_seconds()).await,
        (CommandKind::Assert, sel, val) => engine.assert(sel, val).await,
        (CommandKind::Screenshot, _, val) => {
            let path = val
                .map(str::to_string)
                .unwrap_or_else(|| format!("screenshot-{}.png", index + 1));
            engine.screenshot(&path).await
        }
        _ => Err(RunnerError::engine("command is missing a required field")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_engine::LogEngine;
    use async_trait::async_trait;

    fn command(kind: CommandKind, selector: Option<&str>, value: Option<&str>) -> Command {
        let mut c = Command::new(kind);
        c.selector = selector.map(str::to_string);
        c.value = value.map(str::to_string);
        c
    }

    fn login_commands() -> Vec<Command> {
        vec![
            command(CommandKind::Navigate, None, Some("https://example.com")),
            command(CommandKind::Click, Some("#login"), None),
            command(CommandKind::Assert, Some(".welcome"), None),
        ]
    }

    /// Fails every click; everything else succeeds silently.
    struct FailingClick;

    #[async_trait]
    impl BrowserEngine for FailingClick {
        async fn navigate(&self, _url: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn click(&self, selector: &str) -> Result<(), RunnerError> {
            Err(RunnerError::engine(format!("element not found: {selector}")))
        }
        async fn type_text(&self, _s: &str, _v: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn fill(&self, _s: &str, _v: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn assert(&self, _s: Option<&str>, _v: Option<&str>) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn wait(&self, _s: Option<&str>, _secs: Option<f64>) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn screenshot(&self, _p: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn select(&self, _s: &str, _v: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn hover(&self, _s: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn press(&self, _k: &str) -> Result<(), RunnerError> {
            Ok(())
        }
    }

    /// Navigate hangs long enough to trip any reasonable step timeout.
    struct SlowNavigate;

    #[async_trait]
    impl BrowserEngine for SlowNavigate {
        async fn navigate(&self, _url: &str) -> Result<(), RunnerError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(())
        }
        async fn click(&self, _s: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn type_text(&self, _s: &str, _v: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn fill(&self, _s: &str, _v: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn assert(&self, _s: Option<&str>, _v: Option<&str>) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn wait(&self, _s: Option<&str>, _secs: Option<f64>) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn screenshot(&self, _p: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn select(&self, _s: &str, _v: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn hover(&self, _s: &str) -> Result<(), RunnerError> {
            Ok(())
        }
        async fn press(&self, _k: &str) -> Result<(), RunnerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn replays_every_step_in_order() {
        let engine = LogEngine::new();
        let report = run_commands(&engine, &login_commands(), &RunOptions::default()).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 3);
        assert_eq!(report.failed, 0);
        assert!(report.succeeded());
        assert_eq!(
            engine.actions(),
            vec![
                "navigate to https://example.com",
                "click #login",
                "assert .welcome is visible",
            ]
        );
    }

    #[tokio::test]
    async fn first_failure_halts_and_reports_the_rest_as_skipped() {
        let report = run_commands(&FailingClick, &login_commands(), &RunOptions::default()).await;

        assert!(!report.succeeded());
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.steps[1].status, StepStatus::Failed);
        assert!(report.steps[1].error.as_ref().unwrap().contains("#login"));
        assert_eq!(report.steps[2].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn unknown_kind_is_skipped_not_failed() {
        let engine = LogEngine::new();
        let commands = vec![
            command(CommandKind::Navigate, None, Some("https://example.com")),
            command(CommandKind::Other("scroll".into()), None, None),
            command(CommandKind::Click, Some("#next"), None),
        ];
        let report = run_commands(&engine, &commands, &RunOptions::default()).await;

        assert!(report.succeeded());
        assert_eq!(report.passed, 2);
        assert_eq!(report.skipped, 1);
        assert!(report.steps[1].error.as_ref().unwrap().contains("scroll"));
        assert_eq!(engine.actions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_step_times_out_as_a_failure() {
        let options = RunOptions { step_timeout: Duration::from_secs(5) };
        let commands = vec![command(CommandKind::Navigate, None, Some("https://example.com"))];
        let report = run_commands(&SlowNavigate, &commands, &options).await;

        assert_eq!(report.failed, 1);
        assert!(report.steps[0].error.as_ref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn screenshot_without_path_gets_a_numbered_one() {
        let engine = LogEngine::new();
        let commands = vec![
            command(CommandKind::Navigate, None, Some("https://example.com")),
            command(CommandKind::Screenshot, None, None),
        ];
        run_commands(&engine, &commands, &RunOptions::default()).await;
        assert_eq!(engine.actions()[1], "screenshot to screenshot-2.png");
    }

    #[tokio::test]
    async fn wait_value_is_read_as_seconds() {
        let engine = LogEngine::new();
        let commands = vec![command(CommandKind::Wait, None, Some("2"))];
        let report = run_commands(&engine, &commands, &RunOptions::default()).await;

        assert_eq!(report.passed, 1);
        assert_eq!(engine.actions(), vec!["wait 2s"]);
    }

    #[tokio::test]
    async fn report_serializes_for_export() {
        let engine = LogEngine::new();
        let report = run_commands(&engine, &login_commands(), &RunOptions::default()).await;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["steps"][0]["status"], "passed");
    }
}
