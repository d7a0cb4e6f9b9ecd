//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid sizes: fileSize={file_size}, chunkSize={chunk_size}")]
    InvalidSizes { file_size: i64, chunk_size: i64 },

    #[error("chunk index {index} out of range (totalChunks={total})")]
    ChunkOutOfRange { index: u64, total: u64 },

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("upload not found: {0}")]
    UploadNotFound(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
