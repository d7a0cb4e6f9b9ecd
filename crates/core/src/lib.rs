//! Core domain types and shared logic for the filedrop upload service.
//!
//! This crate defines the canonical data model used across all other crates:
//! - User records, upload metadata, and history entries
//! - Snapshot views returned to clients
//! - Id generation over fixed alphabets
//! - Filename sanitation for assembled artifacts
//! - Configuration types

pub mod config;
pub mod error;
pub mod filename;
pub mod id;
pub mod upload;

pub use config::{AppConfig, ServerConfig, StorageConfig};
pub use error::{Error, Result};
pub use filename::safe_file_name;
pub use upload::{
    ChunkEvent, HistoryEntry, Snapshot, UploadMetadata, UploadStats, UploadStatus, UploadView,
    UserRecord,
};

/// Length of a generated user key.
pub const USER_KEY_LEN: usize = 16;

/// Length of a generated upload id.
pub const UPLOAD_ID_LEN: usize = 20;

/// Maximum history entries retained per user, newest first.
pub const HISTORY_CAP: usize = 200;

/// Gaps between chunk requests longer than this count as downtime
/// rather than active transfer time.
pub const DOWNTIME_THRESHOLD_SECONDS: f64 = 2.0;
