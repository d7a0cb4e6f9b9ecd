//! The upload coordinator.
//!
//! All metadata mutations go through either the [`StateStore`]
//! (persistent uploads, serialized globally by its transaction queue) or
//! the [`UploadRegistry`] (ephemeral uploads, serialized by the registry
//! lock) — never both for the same upload.

use crate::error::{ApiError, ApiResult};
use crate::registry::UploadRegistry;
use bytes::Bytes;
use filedrop_core::{
    Error as CoreError, HistoryEntry, Snapshot, UploadMetadata, UploadStatus, UploadView,
    UserRecord, id,
};
use filedrop_state::StateStore;
use filedrop_storage::ChunkStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

/// Where an upload's metadata lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Ephemeral bucket, dropped on restart.
    Memory,
    /// Durable state document.
    Persistent,
}

/// Result of identifying a user.
#[derive(Debug)]
pub struct Identified {
    pub user_key: String,
    /// True when a fresh key was allocated.
    pub created: bool,
}

/// Parameters for creating an upload.
#[derive(Debug)]
pub struct CreateUpload {
    pub file_name: String,
    pub file_size: i64,
    pub chunk_size: i64,
    pub persist: bool,
}

/// Result of recording one chunk.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub upload: UploadView,
    /// True for exactly the call whose mark completed the set.
    pub completed: bool,
}

/// Coordinates the full upload lifecycle over the state store, the
/// ephemeral registry and the chunk store.
pub struct UploadManager {
    state: Arc<StateStore>,
    chunks: Arc<ChunkStore>,
    registry: UploadRegistry,
}

impl UploadManager {
    pub fn new(state: Arc<StateStore>, chunks: Arc<ChunkStore>) -> Self {
        Self {
            state,
            chunks,
            registry: UploadRegistry::new(),
        }
    }

    /// The chunk store backing this manager.
    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Identify a user, returning their key and whether it is new.
    ///
    /// A requested key is honored only if it already exists in state; an
    /// unknown key is NOT claimable and a fresh key is allocated instead,
    /// so lost keys stay lost.
    pub async fn identify_user(&self, requested: Option<String>) -> ApiResult<Identified> {
        let now = OffsetDateTime::now_utc();

        if let Some(key) = requested.filter(|k| !k.is_empty()) {
            let known = self
                .state
                .read_state(|doc| doc.users.contains_key(&key))
                .await;
            if known {
                self.registry.ensure_bucket(&key).await;
                return Ok(Identified {
                    user_key: key,
                    created: false,
                });
            }
        }

        let user_key = self
            .state
            .with_state(|doc| {
                let mut key = id::new_user_key();
                while doc.users.contains_key(&key) {
                    key = id::new_user_key();
                }
                doc.users
                    .insert(key.clone(), UserRecord::new(key.clone(), now));
                Ok(key)
            })
            .await?;
        self.registry.ensure_bucket(&user_key).await;

        tracing::info!(user_key = %user_key, "new user identified");
        Ok(Identified {
            user_key,
            created: true,
        })
    }

    /// Build the `{active, paused, history}` snapshot for a user,
    /// merging persistent and ephemeral uploads.
    pub async fn snapshot(&self, user_key: &str) -> ApiResult<Snapshot> {
        let record = self
            .state
            .read_state(|doc| doc.user(user_key).cloned())
            .await;
        let has_bucket = self.registry.has_bucket(user_key).await;
        if record.is_none() && !has_bucket {
            return Err(ApiError::UserNotFound(user_key.to_string()));
        }

        let mut uploads: Vec<UploadMetadata> = record
            .as_ref()
            .map(|r| r.uploads.values().cloned().collect())
            .unwrap_or_default();
        uploads.extend(self.registry.user_uploads(user_key).await);
        uploads.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut snapshot = Snapshot {
            history: record.map(|r| r.history).unwrap_or_default(),
            ..Default::default()
        };
        for meta in &uploads {
            match meta.status {
                UploadStatus::Active => snapshot.active.push(UploadView::of(meta)),
                UploadStatus::Paused => snapshot.paused.push(UploadView::of(meta)),
                // Completed uploads live in history, never in the live set.
                UploadStatus::Completed => {}
            }
        }
        Ok(snapshot)
    }

    /// Create a new upload and its scratch directory.
    pub async fn create_upload(&self, user_key: &str, req: CreateUpload) -> ApiResult<UploadView> {
        let now = OffsetDateTime::now_utc();
        let meta = UploadMetadata::new(
            id::new_upload_id(),
            user_key.to_string(),
            req.file_name,
            req.file_size,
            req.chunk_size,
            req.persist,
            now,
        )?;

        if meta.persist {
            let stored = meta.clone();
            self.state
                .with_state(|doc| {
                    let user = doc.ensure_user(&stored.user_key, now);
                    user.uploads.insert(stored.id.clone(), stored);
                    Ok(())
                })
                .await?;
        } else {
            self.registry.insert(meta.clone()).await;
        }

        self.chunks.create_scratch(&meta.id).await?;

        tracing::info!(
            upload_id = %meta.id,
            user_key = %user_key,
            persist = meta.persist,
            total_chunks = meta.total_chunks,
            "upload created"
        );
        Ok(UploadView::of(&meta))
    }

    /// Fetch one upload with its location.
    pub async fn get_upload(
        &self,
        user_key: &str,
        upload_id: &str,
    ) -> ApiResult<(Location, UploadView)> {
        let (location, meta) = self.lookup(user_key, upload_id).await?;
        Ok((location, UploadView::of(&meta)))
    }

    /// Ephemeral bucket first, then the persistent record.
    async fn lookup(
        &self,
        user_key: &str,
        upload_id: &str,
    ) -> ApiResult<(Location, UploadMetadata)> {
        if let Some(meta) = self.registry.get(user_key, upload_id).await {
            return Ok((Location::Memory, meta));
        }
        let meta = self
            .state
            .read_state(|doc| {
                doc.user(user_key)
                    .and_then(|user| user.uploads.get(upload_id).cloned())
            })
            .await;
        match meta {
            Some(meta) => Ok((Location::Persistent, meta)),
            None => Err(ApiError::UploadNotFound(upload_id.to_string())),
        }
    }

    /// Record one chunk: bytes land on disk first, then the index is
    /// marked and the request timing folded into the transfer stats
    /// inside the serialized section for the upload's home, which is
    /// also where the completion transition is decided.
    ///
    /// `started_at` is when the request began (the caller measures it
    /// before reading the payload, so transfer time covers the body
    /// read).
    pub async fn record_chunk(
        &self,
        user_key: &str,
        upload_id: &str,
        index: u64,
        data: Bytes,
        started_at: OffsetDateTime,
    ) -> ApiResult<ChunkOutcome> {
        let (location, meta) = self.lookup(user_key, upload_id).await?;
        if index >= meta.total_chunks {
            return Err(ApiError::ChunkOutOfRange {
                index,
                total: meta.total_chunks,
            });
        }

        let size = data.len() as u64;
        self.chunks.write_chunk(upload_id, index, data).await?;

        let now = OffsetDateTime::now_utc();
        match location {
            Location::Memory => {
                let marked = self
                    .registry
                    .update(user_key, upload_id, |meta| {
                        let inserted = meta.mark_received(index, now)?;
                        meta.record_transfer(index, size, started_at, now, inserted);
                        Ok::<_, CoreError>((
                            UploadView::of(meta),
                            inserted && meta.is_complete(),
                        ))
                    })
                    .await;
                match marked {
                    Some(Ok((upload, completed))) => Ok(ChunkOutcome { upload, completed }),
                    Some(Err(err)) => Err(err.into()),
                    None => Err(ApiError::UploadNotFound(upload_id.to_string())),
                }
            }
            Location::Persistent => {
                let (upload, completed) = self
                    .state
                    .with_state(|doc| {
                        let meta = doc
                            .user_mut(user_key)
                            .and_then(|user| user.uploads.get_mut(upload_id))
                            .ok_or_else(|| CoreError::UploadNotFound(upload_id.to_string()))?;
                        let inserted = meta.mark_received(index, now)?;
                        meta.record_transfer(index, size, started_at, now, inserted);
                        Ok((UploadView::of(meta), inserted && meta.is_complete()))
                    })
                    .await?;
                Ok(ChunkOutcome { upload, completed })
            }
        }
    }

    /// Apply a pause/resume status unconditionally; the client state
    /// machine enforces transition ordering.
    pub async fn update_status(
        &self,
        user_key: &str,
        upload_id: &str,
        status: UploadStatus,
    ) -> ApiResult<UploadView> {
        let now = OffsetDateTime::now_utc();

        if let Some(view) = self
            .registry
            .update(user_key, upload_id, |meta| {
                meta.status = status;
                meta.updated_at = now;
                UploadView::of(meta)
            })
            .await
        {
            return Ok(view);
        }

        let view = self
            .state
            .with_state(|doc| {
                let meta = doc
                    .user_mut(user_key)
                    .and_then(|user| user.uploads.get_mut(upload_id))
                    .ok_or_else(|| CoreError::UploadNotFound(upload_id.to_string()))?;
                meta.status = status;
                meta.updated_at = now;
                Ok(UploadView::of(meta))
            })
            .await?;
        Ok(view)
    }

    /// Mark an upload completed, run the statistics sweep, append its
    /// history entry and drop the live metadata from wherever it lived.
    pub async fn finalize_upload(
        &self,
        user_key: &str,
        upload_id: &str,
        assembly_seconds: f64,
    ) -> ApiResult<UploadView> {
        let now = OffsetDateTime::now_utc();

        if let Some(mut meta) = self.registry.remove(user_key, upload_id).await {
            meta.status = UploadStatus::Completed;
            meta.updated_at = now;
            meta.completed_at = Some(now);
            meta.finalize_stats(assembly_seconds);
            // Live ephemeral metadata never touches the state document,
            // but the terminal history entry is durable.
            let entry = HistoryEntry::from_upload(&meta, now);
            self.state
                .with_state(|doc| {
                    doc.ensure_user(user_key, now).push_history(entry);
                    Ok(())
                })
                .await?;
            tracing::info!(upload_id = %upload_id, "ephemeral upload completed");
            return Ok(UploadView::of(&meta));
        }

        let view = self
            .state
            .with_state(|doc| {
                let user = doc
                    .user_mut(user_key)
                    .ok_or_else(|| CoreError::UploadNotFound(upload_id.to_string()))?;
                let mut meta = user
                    .uploads
                    .remove(upload_id)
                    .ok_or_else(|| CoreError::UploadNotFound(upload_id.to_string()))?;
                meta.status = UploadStatus::Completed;
                meta.updated_at = now;
                meta.completed_at = Some(now);
                meta.finalize_stats(assembly_seconds);
                user.push_history(HistoryEntry::from_upload(&meta, now));
                Ok(UploadView::of(&meta))
            })
            .await?;
        tracing::info!(upload_id = %upload_id, "upload completed");
        Ok(view)
    }

    /// Drop an upload's live metadata without completing it. A history
    /// entry is written unless `forget` is set. The caller purges the
    /// scratch directory.
    pub async fn remove_upload(
        &self,
        user_key: &str,
        upload_id: &str,
        forget: bool,
    ) -> ApiResult<UploadView> {
        let now = OffsetDateTime::now_utc();

        if let Some(meta) = self.registry.remove(user_key, upload_id).await {
            if !forget {
                let entry = HistoryEntry::from_upload(&meta, now);
                self.state
                    .with_state(|doc| {
                        doc.ensure_user(user_key, now).push_history(entry);
                        Ok(())
                    })
                    .await?;
            }
            tracing::info!(upload_id = %upload_id, forget, "ephemeral upload removed");
            return Ok(UploadView::of(&meta));
        }

        let view = self
            .state
            .with_state(|doc| {
                let user = doc
                    .user_mut(user_key)
                    .ok_or_else(|| CoreError::UploadNotFound(upload_id.to_string()))?;
                let meta = user
                    .uploads
                    .remove(upload_id)
                    .ok_or_else(|| CoreError::UploadNotFound(upload_id.to_string()))?;
                if !forget {
                    user.push_history(HistoryEntry::from_upload(&meta, now));
                }
                Ok(UploadView::of(&meta))
            })
            .await?;
        tracing::info!(upload_id = %upload_id, forget, "upload removed");
        Ok(view)
    }

    /// Replace the user's history with an empty list.
    pub async fn clear_history(&self, user_key: &str) -> ApiResult<()> {
        self.state
            .with_state(|doc| {
                let user = doc
                    .user_mut(user_key)
                    .ok_or_else(|| CoreError::UserNotFound(user_key.to_string()))?;
                user.history.clear();
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Assemble the final artifact and retire the metadata.
    ///
    /// If assembly fails the metadata stays in place with every index
    /// marked, so the client (or the next startup scan) can re-drive
    /// completion after re-sending the offending chunk.
    pub async fn assemble_and_finalize(
        &self,
        user_key: &str,
        upload_id: &str,
    ) -> ApiResult<UploadView> {
        let (_, meta) = self.lookup(user_key, upload_id).await?;
        let started = Instant::now();
        self.chunks.assemble(&meta).await?;
        let assembly_seconds = started.elapsed().as_secs_f64();
        self.finalize_upload(user_key, upload_id, assembly_seconds).await
    }

    /// Remove an upload's scratch directory.
    pub async fn purge_scratch(&self, upload_id: &str) -> ApiResult<()> {
        self.chunks.purge_scratch(upload_id).await?;
        Ok(())
    }

    /// Re-drive assembly for persistent uploads whose chunk set was
    /// already complete when the previous process stopped — a crash
    /// between the final mark and finalize leaves exactly this state.
    /// Called once at startup, before the server accepts requests.
    pub async fn recover_pending_assemblies(&self) -> ApiResult<usize> {
        let pending: Vec<(String, String)> = self
            .state
            .read_state(|doc| {
                doc.users
                    .values()
                    .flat_map(|user| {
                        user.uploads
                            .values()
                            .filter(|meta| meta.is_complete())
                            .map(|meta| (meta.user_key.clone(), meta.id.clone()))
                    })
                    .collect()
            })
            .await;

        let mut recovered = 0;
        for (user_key, upload_id) in pending {
            match self.assemble_and_finalize(&user_key, &upload_id).await {
                Ok(_) => {
                    recovered += 1;
                    tracing::info!(upload_id = %upload_id, "recovered torn completion");
                }
                Err(err) => {
                    tracing::warn!(upload_id = %upload_id, error = %err, "torn completion recovery failed");
                }
            }
        }
        Ok(recovered)
    }
}
