//! User identification handler.

use crate::error::ApiResult;
use crate::handlers::read_json_body;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use serde_json::{Value, json};

/// POST /api/users/identify - Return an existing identity or allocate a
/// fresh one.
///
/// A requested key that is not known is ignored and a new key issued;
/// self-asserted keys are recognized, never claimed.
#[tracing::instrument(skip_all)]
pub async fn identify_user(State(state): State<AppState>, req: Request) -> ApiResult<Json<Value>> {
    let body = read_json_body(req).await?;
    let requested = body
        .get("userKey")
        .and_then(Value::as_str)
        .map(str::to_string);

    let identified = state.manager.identify_user(requested).await?;
    let uploads = state.manager.snapshot(&identified.user_key).await?;

    Ok(Json(json!({
        "userKey": identified.user_key,
        "created": identified.created,
        "uploads": uploads,
    })))
}
