//! Chunk store error types.

use thiserror::Error;

/// Chunk store operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata claimed a chunk that has no part file on disk. The
    /// display form doubles as the wire error code.
    #[error("missing_chunk_{index}")]
    MissingChunk { index: u64 },

    /// Assembled output did not add up to the recorded file size.
    #[error("assembled {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("invalid upload id: {0}")]
    InvalidId(String),
}

/// Result type for chunk store operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
