//! HTTP upload coordinator for the filedrop service.
//!
//! This crate provides the server side of resumable chunked uploads:
//! - User identification and per-user snapshots
//! - Upload lifecycle (create, chunk receipt, pause/resume/cancel/forget)
//! - Assembly of scratch chunks into final artifacts
//! - Startup recovery of torn completions
//! - The HTTP surface translating the wire protocol into manager calls

pub mod error;
pub mod handlers;
pub mod manager;
pub mod registry;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use manager::UploadManager;
pub use registry::UploadRegistry;
pub use routes::create_router;
pub use state::AppState;
