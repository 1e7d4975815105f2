//! The browser engine seam.

use crate::RunnerError;
use async_trait::async_trait;

/// One async operation per replayable command kind. Implementations either
/// complete the action or return an error naming what went wrong; they never
/// swallow failures.
///
/// The runner, not the engine, owns ordering, timeouts and reporting.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), RunnerError>;

    async fn click(&self, selector: &str) -> Result<(), RunnerError>;

    async fn type_text(&self, selector: &str, value: &str) -> Result<(), RunnerError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), RunnerError>;

    /// Check page state: with a value, that the element contains the text;
    /// selector alone, that the element is visible; value alone, that the
    /// URL matches.
    async fn assert(&self, selector: Option<&str>, value: Option<&str>)
        -> Result<(), RunnerError>;

    /// Wait for a selector to appear, or for a duration in seconds.
    async fn wait(&self, selector: Option<&str>, seconds: Option<f64>) -> Result<(), RunnerError>;

    async fn screenshot(&self, path: &str) -> Result<(), RunnerError>;

    async fn select(&self, selector: &str, value: &str) -> Result<(), RunnerError>;

    async fn hover(&self, selector: &str) -> Result<(), RunnerError>;

    async fn press(&self, key: &str) -> Result<(), RunnerError>;
}
