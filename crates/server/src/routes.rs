//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit();

    Router::new()
        // Identity
        .route("/api/users/identify", post(handlers::identify_user))
        // Upload lifecycle
        .route(
            "/api/uploads",
            get(handlers::list_uploads).post(handlers::create_upload),
        )
        .route("/api/uploads/history", delete(handlers::clear_history))
        .route("/api/uploads/{upload_id}", get(handlers::get_upload))
        .route("/api/uploads/{upload_id}/chunk", post(handlers::upload_chunk))
        .route(
            "/api/uploads/{upload_id}/state",
            post(handlers::update_upload_state),
        )
        // Bandwidth probe
        .route("/api/network/probe", post(handlers::network_probe))
        // Finalized artifacts
        .route("/api/files", get(handlers::list_files))
        .route("/api/files/{file_name}", get(handlers::download_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
