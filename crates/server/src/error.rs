//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use filedrop_state::StateError;
use filedrop_storage::StorageError;
use serde::Serialize;

/// API error response body: `{ "error": "<code>" }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error code for programmatic handling.
    pub error: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing user key")]
    MissingUserKey,

    #[error("missing required fields")]
    MissingFields,

    #[error("fileSize and chunkSize must be positive")]
    InvalidSizes,

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("missing chunk field")]
    MissingChunk,

    #[error("missing sample field")]
    MissingSample,

    #[error("invalid chunk index: {0}")]
    InvalidChunkIndex(String),

    #[error("chunk index {index} out of range (totalChunks={total})")]
    ChunkOutOfRange { index: u64, total: u64 },

    #[error("upload not found: {0}")]
    UploadNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Assembly found metadata claiming a chunk with no part file on
    /// disk. The upload stays in place so the client can re-send it.
    #[error("assembly failed: missing chunk {index}")]
    AssemblyMissingChunk { index: u64 },

    #[error("assembly failed: wrote {actual} bytes, expected {expected}")]
    AssemblySizeMismatch { expected: u64, actual: u64 },

    #[error("state error: {0}")]
    State(StateError),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the wire error code for this error.
    pub fn code(&self) -> String {
        match self {
            Self::MissingUserKey => "missing_user_key".to_string(),
            Self::MissingFields => "missing_fields".to_string(),
            Self::InvalidSizes => "invalid_sizes".to_string(),
            Self::InvalidAction(_) => "invalid_action".to_string(),
            Self::MissingChunk => "missing_chunk".to_string(),
            Self::MissingSample => "missing_sample".to_string(),
            Self::InvalidChunkIndex(_) => "invalid_chunk_index".to_string(),
            Self::ChunkOutOfRange { .. } => "chunk_out_of_range".to_string(),
            Self::UploadNotFound(_) => "upload_not_found".to_string(),
            Self::UserNotFound(_) => "user_not_found".to_string(),
            Self::FileNotFound(_) => "file_not_found".to_string(),
            Self::PayloadTooLarge(_) => "payload_too_large".to_string(),
            Self::BadRequest(_) => "bad_request".to_string(),
            Self::AssemblyMissingChunk { index } => format!("missing_chunk_{index}"),
            Self::AssemblySizeMismatch { .. } => "assembly_size_mismatch".to_string(),
            Self::State(_) | Self::Storage(_) | Self::Internal(_) => "internal_error".to_string(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingUserKey
            | Self::MissingFields
            | Self::InvalidSizes
            | Self::InvalidAction(_)
            | Self::MissingChunk
            | Self::MissingSample
            | Self::InvalidChunkIndex(_)
            | Self::ChunkOutOfRange { .. }
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UploadNotFound(_) | Self::UserNotFound(_) | Self::FileNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::AssemblyMissingChunk { .. }
            | Self::AssemblySizeMismatch { .. }
            | Self::State(_)
            | Self::Storage(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<filedrop_core::Error> for ApiError {
    fn from(err: filedrop_core::Error) -> Self {
        use filedrop_core::Error;
        match err {
            Error::InvalidSizes { .. } => Self::InvalidSizes,
            Error::ChunkOutOfRange { index, total } => Self::ChunkOutOfRange { index, total },
            Error::UserNotFound(key) => Self::UserNotFound(key),
            Error::UploadNotFound(id) => Self::UploadNotFound(id),
            Error::InvalidAction(action) => Self::InvalidAction(action),
        }
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match err {
            // A mutator rejection carries a domain error; everything else
            // is infrastructure.
            StateError::Domain(domain) => domain.into(),
            other => Self::State(other),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MissingChunk { index } => Self::AssemblyMissingChunk { index },
            StorageError::SizeMismatch { expected, actual } => {
                Self::AssemblySizeMismatch { expected, actual }
            }
            other => Self::Storage(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = %self.code(), "request failed");
        }
        let body = ErrorBody { error: self.code() };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
