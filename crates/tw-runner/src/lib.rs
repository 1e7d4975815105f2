//! tw-runner: replay stored command lists through a browser engine.
//!
//! [`engine::BrowserEngine`] is the seam: one async method per command kind.
//! [`runner::run_commands`] walks a command list in order under a per-step
//! timeout and produces a [`runner::RunReport`]. The shipped
//! [`log_engine::LogEngine`] performs no browser work, it records what each
//! step would do, which backs the dry-run mode.

pub mod engine;
pub mod log_engine;
pub mod runner;

pub use engine::BrowserEngine;
pub use log_engine::LogEngine;
pub use runner::{run_commands, RunOptions, RunReport, StepReport, StepStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("engine error: {0}")]
    Engine(String),
    #[error("step timed out after {0} ms")]
    Timeout(u64),
}

impl RunnerError {
    pub fn engine(message: impl Into<String>) -> Self {
        RunnerError::Engine(message.into())
    }
}
