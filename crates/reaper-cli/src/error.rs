//! Error types for the CLI application.

use reaper_janitor::{ConfigError, JanitorError};
use reaper_store::snapshot::SnapshotError;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot loading error
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Janitor error
    #[error("Janitor error: {0}")]
    Janitor(#[from] JanitorError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
