//! Error types for active-sentiment
//!
//! Configuration and data-integrity errors abort a session. A model failure
//! aborts only the iteration it occurred in; earlier run records stay valid.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// active-sentiment error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid session, normalizer, sampler or model configuration
    #[error("Configuration error: {0}\nFix the session configuration and restart the session")]
    Configuration(String),

    /// Pool invariants violated (duplicate ids, misplaced labels, empty training set)
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Classifier fit/predict failed or produced malformed probabilities
    #[error("Model failure: {0}")]
    ModelFailure(String),

    /// Unknown run id, experiment, example or artifact
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage error (Parquet files, artifact store, tracker directory)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort the whole session rather than one iteration.
    ///
    /// Only [`Error::ModelFailure`] is scoped to a single iteration.
    #[must_use]
    pub const fn is_fatal_for_session(&self) -> bool {
        !matches!(self, Self::ModelFailure(_))
    }
}
