//! HTTP handlers for the upload API.

mod files;
mod network;
mod uploads;
mod users;

pub use files::{download_file, list_files};
pub use network::network_probe;
pub use uploads::{
    clear_history, create_upload, get_upload, list_uploads, update_upload_state, upload_chunk,
};
pub use users::identify_user;

use crate::error::{ApiError, ApiResult};
use axum::extract::Request;
use serde_json::Value;

/// Maximum JSON body size for control-plane requests (64 KiB).
const MAX_JSON_BODY_SIZE: usize = 64 * 1024;

/// Read a request body as JSON. An empty body parses as `null` so
/// endpoints with all-optional fields accept bodyless requests.
pub(crate) async fn read_json_body(req: Request) -> ApiResult<Value> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_JSON_BODY_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Pull a non-empty `userKey` string out of a JSON body.
pub(crate) fn require_user_key(body: &Value) -> ApiResult<String> {
    body.get("userKey")
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::MissingUserKey)
}
