//! testwright host: settings loading, pipeline wiring and the subcommand
//! surface behind the `testwright` binary.

pub mod config;
pub mod pipeline;

pub use config::{ConfigError, Settings};
pub use pipeline::{
    GenerateOptions, GenerateOutcome, Generated, Pipeline, PipelineError,
};
