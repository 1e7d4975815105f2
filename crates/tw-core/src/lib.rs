//! tw-core: Shared types for Testwright
//!
//! This crate has zero internal crate dependencies and defines the
//! canonical types used across all other tw-* crates.

pub mod chat;
pub mod command;
pub mod parse;
pub mod provider;
pub mod suite;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::chat::{ChatMessage, ChatSession, ChatTurn, Role};
    pub use crate::command::{Command, CommandKind};
    pub use crate::parse::{
        ParseContext, ParseResult, Question, QuestionKind, Questionnaire, ReplyClassification,
    };
    pub use crate::provider::{
        GenerationOverrides, GenerationParams, ProviderConfig, ProviderKind, TokenUsage,
    };
    pub use crate::suite::TestSuite;
}
