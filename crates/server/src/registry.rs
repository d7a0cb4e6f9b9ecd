//! In-memory registry of ephemeral uploads.

use filedrop_core::UploadMetadata;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory index of ephemeral uploads, bucketed per user key.
///
/// Ephemeral metadata never touches the state document while live
/// (only its history entry is durable), so its lifetime is bounded by
/// the process: a restart drops every bucket. Clients opting out of
/// persistence are told to expect this.
#[derive(Default)]
pub struct UploadRegistry {
    buckets: Mutex<HashMap<String, HashMap<String, UploadMetadata>>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the user's bucket if absent.
    pub async fn ensure_bucket(&self, user_key: &str) {
        self.buckets
            .lock()
            .await
            .entry(user_key.to_string())
            .or_default();
    }

    /// Whether the user has a bucket.
    pub async fn has_bucket(&self, user_key: &str) -> bool {
        self.buckets.lock().await.contains_key(user_key)
    }

    /// Insert an upload into its owner's bucket.
    pub async fn insert(&self, meta: UploadMetadata) {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(meta.user_key.clone())
            .or_default()
            .insert(meta.id.clone(), meta);
    }

    /// Clone out one upload's metadata.
    pub async fn get(&self, user_key: &str, upload_id: &str) -> Option<UploadMetadata> {
        self.buckets
            .lock()
            .await
            .get(user_key)?
            .get(upload_id)
            .cloned()
    }

    /// Remove and return one upload's metadata.
    pub async fn remove(&self, user_key: &str, upload_id: &str) -> Option<UploadMetadata> {
        self.buckets.lock().await.get_mut(user_key)?.remove(upload_id)
    }

    /// Run a closure against one upload inside the registry lock.
    ///
    /// Mutations on the same upload serialize here, so a caller can apply
    /// a mark and observe the completion transition in one critical
    /// section.
    pub async fn update<T>(
        &self,
        user_key: &str,
        upload_id: &str,
        f: impl FnOnce(&mut UploadMetadata) -> T,
    ) -> Option<T> {
        let mut buckets = self.buckets.lock().await;
        let meta = buckets.get_mut(user_key)?.get_mut(upload_id)?;
        Some(f(meta))
    }

    /// Clone out every upload belonging to a user.
    pub async fn user_uploads(&self, user_key: &str) -> Vec<UploadMetadata> {
        self.buckets
            .lock()
            .await
            .get(user_key)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }
}
