//! tw-store: chat-session and test-suite storage backed by SQLite.

pub mod store;

pub use store::{CostEntry, CostSummaryRow, NewSuite, Store};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("suite not found: {0}")]
    SuiteNotFound(uuid::Uuid),
}
