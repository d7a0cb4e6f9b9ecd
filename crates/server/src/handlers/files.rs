//! Listing and download handlers for finalized artifacts.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use filedrop_core::safe_file_name;
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Buffer size for streaming artifacts back to clients (64 KiB).
const STREAM_BUF_SIZE: usize = 64 * 1024;

/// GET /api/files - List every finalized artifact on the server with
/// size, modification time and download path, independent of the
/// requesting user.
#[tracing::instrument(skip_all)]
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let artifacts = state.manager.chunk_store().list_artifacts().await?;
    let files: Vec<Value> = artifacts
        .iter()
        .map(|artifact| {
            json!({
                "fileName": artifact.file_name,
                "size": artifact.size,
                "modifiedAt": artifact
                    .modified_at
                    .and_then(|t| t.format(&Rfc3339).ok()),
                "path": format!("/api/files/{}", artifact.file_name),
            })
        })
        .collect();
    Ok(Json(json!({ "files": files })))
}

/// GET /api/files/{file_name} - Stream a finalized artifact back as an
/// attachment. The requested name is sanitized before the path join so
/// it can only name a direct child of the output directory.
#[tracing::instrument(skip(state))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> ApiResult<Response> {
    let safe = safe_file_name(&file_name);
    let path = state.manager.chunk_store().final_dir().join(&safe);

    let file = match fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::FileNotFound(safe));
        }
        Err(e) => return Err(ApiError::Internal(format!("failed to open artifact: {e}"))),
    };
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stat artifact: {e}")))?
        .len();

    let stream = async_stream::stream! {
        let mut file = file;
        let mut buf = vec![0u8; STREAM_BUF_SIZE];
        loop {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok::<Bytes, std::io::Error>(Bytes::copy_from_slice(&buf[..n])),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{safe}\""),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}
