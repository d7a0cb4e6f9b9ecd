//! Upload lifecycle handlers.

use crate::error::{ApiError, ApiResult};
use crate::handlers::{read_json_body, require_user_key};
use crate::manager::CreateUpload;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, Path, Query, Request, State};
use filedrop_core::{Snapshot, UploadStatus};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;

/// Query string carrying the caller's user key.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserKeyQuery {
    #[serde(default)]
    user_key: Option<String>,
}

impl UserKeyQuery {
    fn require(self) -> ApiResult<String> {
        self.user_key
            .filter(|key| !key.is_empty())
            .ok_or(ApiError::MissingUserKey)
    }
}

/// GET /api/uploads?userKey=... - Per-user snapshot.
#[tracing::instrument(skip_all)]
pub async fn list_uploads(
    State(state): State<AppState>,
    Query(query): Query<UserKeyQuery>,
) -> ApiResult<Json<Snapshot>> {
    let user_key = query.require()?;
    Ok(Json(state.manager.snapshot(&user_key).await?))
}

/// GET /api/uploads/{upload_id}?userKey=... - One upload with its
/// storage location.
#[tracing::instrument(skip_all, fields(upload_id = %upload_id))]
pub async fn get_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    Query(query): Query<UserKeyQuery>,
) -> ApiResult<Json<Value>> {
    let user_key = query.require()?;
    let (location, upload) = state.manager.get_upload(&user_key, &upload_id).await?;
    Ok(Json(json!({ "upload": upload, "location": location })))
}

/// POST /api/uploads - Create a new upload.
#[tracing::instrument(skip_all)]
pub async fn create_upload(State(state): State<AppState>, req: Request) -> ApiResult<Json<Value>> {
    let body = read_json_body(req).await?;
    let user_key = require_user_key(&body)?;

    let file_name = body
        .get("fileName")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let file_size = body.get("fileSize").and_then(Value::as_i64);
    let chunk_size = body.get("chunkSize").and_then(Value::as_i64);
    let persist = body.get("persist").and_then(Value::as_bool).unwrap_or(false);

    let (Some(file_name), Some(file_size), Some(chunk_size)) = (file_name, file_size, chunk_size)
    else {
        return Err(ApiError::MissingFields);
    };

    let upload = state
        .manager
        .create_upload(
            &user_key,
            CreateUpload {
                file_name,
                file_size,
                chunk_size,
                persist,
            },
        )
        .await?;
    Ok(Json(json!({ "upload": upload })))
}

/// POST /api/uploads/{upload_id}/chunk - Receive one chunk as multipart
/// form data (`userKey`, `chunkIndex`, file field `chunk`).
///
/// The completing submission triggers assembly and finalize and answers
/// with a refreshed snapshot.
#[tracing::instrument(skip_all, fields(upload_id = %upload_id))]
pub async fn upload_chunk(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    // Request start, measured before the body is read so the transfer
    // stats cover the payload read time.
    let started_at = OffsetDateTime::now_utc();

    let mut user_key: Option<String> = None;
    let mut chunk_index: Option<String> = None;
    let mut chunk_bytes: Option<bytes::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("userKey") => {
                user_key = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("failed to read userKey field: {e}"))
                })?);
            }
            Some("chunkIndex") => {
                chunk_index = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("failed to read chunkIndex field: {e}"))
                })?);
            }
            Some("chunk") => {
                chunk_bytes = Some(field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("failed to read chunk field: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let user_key = user_key
        .filter(|key| !key.is_empty())
        .ok_or(ApiError::MissingUserKey)?;
    let index_raw = chunk_index.ok_or(ApiError::MissingFields)?;
    let index: u64 = index_raw
        .trim()
        .parse()
        .map_err(|_| ApiError::InvalidChunkIndex(index_raw.clone()))?;
    let data = chunk_bytes.ok_or(ApiError::MissingChunk)?;
    if data.is_empty() {
        return Err(ApiError::MissingChunk);
    }
    if data.len() > state.config.server.max_chunk_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }

    let outcome = state
        .manager
        .record_chunk(&user_key, &upload_id, index, data, started_at)
        .await?;

    if outcome.completed {
        let upload = state
            .manager
            .assemble_and_finalize(&user_key, &upload_id)
            .await?;
        let uploads = state.manager.snapshot(&user_key).await?;
        return Ok(Json(json!({
            "status": "completed",
            "upload": upload,
            "uploads": uploads,
        })));
    }

    Ok(Json(json!({ "status": "ok", "upload": outcome.upload })))
}

/// POST /api/uploads/{upload_id}/state - Client-driven state transition:
/// pause, resume, cancel or forget.
#[tracing::instrument(skip_all, fields(upload_id = %upload_id))]
pub async fn update_upload_state(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    req: Request,
) -> ApiResult<Json<Value>> {
    let body = read_json_body(req).await?;
    let user_key = require_user_key(&body)?;
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .ok_or(ApiError::MissingFields)?;

    let upload = match action {
        "pause" => {
            state
                .manager
                .update_status(&user_key, &upload_id, UploadStatus::Paused)
                .await?
        }
        "resume" => {
            state
                .manager
                .update_status(&user_key, &upload_id, UploadStatus::Active)
                .await?
        }
        "cancel" => {
            let upload = state.manager.remove_upload(&user_key, &upload_id, false).await?;
            state.manager.purge_scratch(&upload_id).await?;
            upload
        }
        "forget" => {
            let upload = state.manager.remove_upload(&user_key, &upload_id, true).await?;
            state.manager.purge_scratch(&upload_id).await?;
            upload
        }
        other => return Err(ApiError::InvalidAction(other.to_string())),
    };

    let uploads = state.manager.snapshot(&user_key).await?;
    Ok(Json(json!({ "upload": upload, "uploads": uploads })))
}

/// DELETE /api/uploads/history - Replace the user's history with an
/// empty list.
#[tracing::instrument(skip_all)]
pub async fn clear_history(State(state): State<AppState>, req: Request) -> ApiResult<Json<Snapshot>> {
    let body = read_json_body(req).await?;
    let user_key = require_user_key(&body)?;
    state.manager.clear_history(&user_key).await?;
    Ok(Json(state.manager.snapshot(&user_key).await?))
}
