//! Error types for Janitor operations

use reaper_domain::DurationParseError;
use thiserror::Error;

/// Errors that can occur during Janitor operations
///
/// A missing record is never an error, and policy lookup failures are
/// absorbed by the eligibility policy (the record is kept).
#[derive(Error, Debug)]
pub enum JanitorError {
    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(String),

    /// TTL annotation could not be parsed
    #[error("failed parsing {annotation} with value {value:?}: {source}")]
    InvalidTtl {
        /// Annotation key
        annotation: &'static str,
        /// Raw annotation value
        value: String,
        /// Parse failure
        #[source]
        source: DurationParseError,
    },

    /// Reconcile stopped because shutdown was requested
    #[error("Reconcile cancelled")]
    Cancelled,

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}
