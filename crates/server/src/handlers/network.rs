//! Bandwidth probe handler.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, State};
use serde_json::{Value, json};
use std::time::Instant;

/// POST /api/network/probe - Byte-counting echo.
///
/// The client posts a `sample` blob and derives its effective bandwidth
/// from the reported size and server-side elapsed time.
#[tracing::instrument(skip_all)]
pub async fn network_probe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let started = Instant::now();

    let mut sample: Option<bytes::Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        if name.as_deref() == Some("sample") {
            sample = Some(field.bytes().await.map_err(|e| {
                ApiError::BadRequest(format!("failed to read sample field: {e}"))
            })?);
        }
    }

    let sample = sample.ok_or(ApiError::MissingSample)?;
    if sample.len() > state.config.server.max_probe_size {
        return Err(ApiError::PayloadTooLarge(sample.len()));
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    Ok(Json(json!({ "bytes": sample.len(), "elapsedMs": elapsed_ms })))
}
