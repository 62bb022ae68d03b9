//! Error types for mutation testing

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort bootstrap or configuration loading
#[derive(Debug, Error)]
pub enum MutantError {
    /// Expression text matched none of the expression grammars
    #[error("Invalid expression: '{input}'")]
    InvalidExpression { input: String },

    /// Two candidate expressions match a program point equally well
    #[error("Ambiguous expression match for '{target}': {}", candidates.join(", "))]
    AmbiguousExpression {
        target: String,
        candidates: Vec<String>,
    },

    /// No integration registered under the configured name
    #[error("Unknown integration '{name}'\n  Available integrations: {}", available.join(", "))]
    UnknownIntegration { name: String, available: Vec<String> },

    /// Integration refused to set up
    #[error("Integration '{name}' setup failed: {message}")]
    IntegrationSetup { name: String, message: String },

    /// A required file could not be found in any include directory
    #[error("Cannot load '{name}'\n  Searched: {}", format_paths(searched))]
    RequireNotFound { name: String, searched: Vec<PathBuf> },

    /// Failed to read source file
    #[error("Failed to read file '{}': {error}", file.display())]
    FileReadError { file: PathBuf, error: String },

    /// Failed to parse source file into a syntax tree
    #[error("Failed to parse '{}': {error}", file.display())]
    ParseError { file: PathBuf, error: String },

    /// A source location does not point at a node of the program image
    #[error("No node at {}:{:?}", file.display(), node_path)]
    InvalidLocation { file: PathBuf, node_path: Vec<usize> },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// The worker pool could not be started
    #[error("Failed to start worker threads: {error}")]
    WorkerSpawn { error: String },
}

/// Failures of the isolation boundary
///
/// These never abort a run: the environment turns them into a failing test
/// result for the mutation being evaluated.
#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("isolated work panicked: {message}")]
    Panicked { message: String },

    #[error("isolated work did not finish within {:.1}s", timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    #[error("isolation result channel closed before a result was sent")]
    ChannelClosed,

    #[error("failed to start isolated work: {error}")]
    Spawn { error: String },
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for mutant operations
pub type Result<T> = std::result::Result<T, MutantError>;
