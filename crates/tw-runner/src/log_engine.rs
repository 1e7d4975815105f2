//! Dry-run engine: records what each step would do instead of doing it.

use crate::engine::BrowserEngine;
use crate::RunnerError;
use async_trait::async_trait;
use std::sync::Mutex;

/// An engine that drives no browser. Every action is appended to an internal
/// log and emitted at INFO, so a dry run shows exactly what a real replay
/// would attempt, in order.
#[derive(Default)]
pub struct LogEngine {
    actions: Mutex<Vec<String>>,
}

impl LogEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded actions, oldest first.
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn record(&self, action: String) -> Result<(), RunnerError> {
        tracing::info!(action = %action, "dry-run");
        self.actions
            .lock()
            .map_err(|e| RunnerError::engine(e.to_string()))?
            .push(action);
        Ok(())
    }
}

#[async_trait]
impl BrowserEngine for LogEngine {
    async fn navigate(&self, url: &str) -> Result<(), RunnerError> {
        self.record(format!("navigate to {url}"))
    }

    async fn click(&self, selector: &str) -> Result<(), RunnerError> {
        self.record(format!("click {selector}"))
    }

    async fn type_text(&self, selector: &str, value: &str) -> Result<(), RunnerError> {
        self.record(format!("type {value:?} into {selector}"))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), RunnerError> {
        self.record(format!("fill {selector} with {value:?}"))
    }

    async fn assert(
        &self,
        selector: Option<&str>,
        value: Option<&str>,
    ) -> Result<(), RunnerError> {
        let action = match (selector, value) {
            (Some(sel), Some(val)) => format!("assert {sel} contains {val:?}"),
            (Some(sel), None) => format!("assert {sel} is visible"),
            (None, Some(val)) => format!("assert url matches {val:?}"),
            (None, None) => "assert (nothing specified)".to_string(),
        };
        self.record(action)
    }

    async fn wait(&self, selector: Option<&str>, seconds: Option<f64>) -> Result<(), RunnerError> {
        let action = match (selector, seconds) {
            (Some(sel), _) => format!("wait for {sel}"),
            (None, Some(s)) => format!("wait {s}s"),
            (None, None) => "wait (nothing specified)".to_string(),
        };
        self.record(action)
    }

    async fn screenshot(&self, path: &str) -> Result<(), RunnerError> {
        self.record(format!("screenshot to {path}"))
    }

    async fn select(&self, selector: &str, value: &str) -> Result<(), RunnerError> {
        self.record(format!("select {value:?} in {selector}"))
    }

    async fn hover(&self, selector: &str) -> Result<(), RunnerError> {
        self.record(format!("hover {selector}"))
    }

    async fn press(&self, key: &str) -> Result<(), RunnerError> {
        self.record(format!("press {key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_actions_in_order() {
        let engine = LogEngine::new();
        engine.navigate("https://example.com").await.unwrap();
        engine.click("#login").await.unwrap();
        engine.assert(Some(".welcome"), None).await.unwrap();

        let actions = engine.actions();
        assert_eq!(
            actions,
            vec![
                "navigate to https://example.com",
                "click #login",
                "assert .welcome is visible",
            ]
        );
    }
}
