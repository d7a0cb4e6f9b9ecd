//! Application state shared across handlers.

use crate::manager::UploadManager;
use filedrop_core::AppConfig;
use filedrop_state::{StateResult, StateStore};
use filedrop_storage::ChunkStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// The upload coordinator.
    pub manager: Arc<UploadManager>,
}

impl AppState {
    /// Open the state document and wire up the manager over the
    /// configured data directory.
    pub async fn new(config: AppConfig) -> StateResult<Self> {
        let store = Arc::new(StateStore::open(config.storage.state_path()).await?);
        let chunks = Arc::new(ChunkStore::new(
            config.storage.upload_dir(),
            config.storage.final_dir(),
        ));
        let manager = Arc::new(UploadManager::new(store, chunks));
        Ok(Self {
            config: Arc::new(config),
            manager,
        })
    }
}
