//! Error types for hierhash.

use thiserror::Error;

/// Errors that can occur during hashing, indexing, or search.
#[derive(Debug, Error)]
pub enum HashError {
    /// Invalid depth, level, threshold or pool size at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Empty vector or otherwise unusable input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Two vectors of different length were compared.
    #[error("dimension mismatch: left has {left} dimensions, right has {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// A score that cannot be ranked (e.g. KL divergence against a zero bin).
    #[error("non-finite score: {0}")]
    NonFiniteScore(f64),

    /// Failure reported by the inverted-index collaborator.
    #[error("index I/O error: {0}")]
    IndexIo(String),

    /// Worker pool deadline exceeded.
    #[error("timed out after {finished} of {submitted} tasks")]
    Timeout { finished: usize, submitted: usize },

    /// I/O error (snapshot files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HashError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn index(msg: impl Into<String>) -> Self {
        Self::IndexIo(msg.into())
    }
}

impl From<serde_json::Error> for HashError {
    fn from(e: serde_json::Error) -> Self {
        Self::Configuration(format!("json: {e}"))
    }
}

impl From<postcard::Error> for HashError {
    fn from(e: postcard::Error) -> Self {
        Self::IndexIo(format!("postcard error: {e}"))
    }
}

/// Result type for hierhash operations.
pub type Result<T> = std::result::Result<T, HashError>;
