//! State store error types.

use thiserror::Error;

/// State store operation errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A mutator rejected the transaction; nothing was persisted.
    #[error(transparent)]
    Domain(#[from] filedrop_core::Error),
}

/// Result type for state store operations.
pub type StateResult<T> = std::result::Result<T, StateError>;
