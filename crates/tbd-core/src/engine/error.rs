//! Error types for the engine bridge
//!
//! Only the non-real-time entry points (state import/export and loading the
//! bundled defaults) can fail; block processing never returns an error.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while exchanging state with an engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The state document is not valid JSON or does not match the data model
    #[error("Malformed engine state document: {0}")]
    MalformedState(#[from] serde_json::Error),

    /// The document parsed but carries a value the engine cannot use
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Failed to read the bundled engine configuration
    #[error("Failed to read engine data '{path}': {source}")]
    DataRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A thread panicked while holding the engine lock
    #[error("Engine lock poisoned")]
    Poisoned,
}

/// Result type for engine state operations
pub type EngineResult<T> = Result<T, EngineError>;
