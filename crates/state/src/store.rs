//! Serialized access to the on-disk state document.

use crate::document::StateDocument;
use crate::error::{StateError, StateResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

/// Durable, serialized access to the state document.
///
/// The document is loaded once at open and kept in memory; every
/// transaction rewrites the whole file. A `tokio::sync::Mutex` provides
/// the single-writer queue: waiters are served in arrival order, and
/// readers share the queue with writers so no read can observe an
/// in-flight write.
pub struct StateStore {
    path: PathBuf,
    inner: Mutex<StateDocument>,
}

impl StateStore {
    /// Open the store, reading the document from `path`.
    ///
    /// A missing file yields the empty document; the file is created on
    /// the first transaction.
    pub async fn open(path: impl Into<PathBuf>) -> StateResult<Self> {
        let path = path.into();
        let document = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateDocument::default(),
            Err(e) => return Err(StateError::Io(e)),
        };
        tracing::debug!(path = %path.display(), users = document.users.len(), "state loaded");
        Ok(Self {
            path,
            inner: Mutex::new(document),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a mutating transaction.
    ///
    /// The mutator receives a deep copy of the document; the copy is
    /// persisted and swapped in only if both the mutator and the disk
    /// write succeed, so a failed transaction leaves no partial changes
    /// in memory or on disk.
    #[instrument(skip_all)]
    pub async fn with_state<T, F>(&self, mutate: F) -> StateResult<T>
    where
        F: FnOnce(&mut StateDocument) -> filedrop_core::Result<T>,
    {
        let mut current = self.inner.lock().await;
        let mut draft = current.clone();
        let value = mutate(&mut draft)?;
        self.persist(&draft).await?;
        *current = draft;
        Ok(value)
    }

    /// Run a read-only selector against the current document.
    ///
    /// Shares the transaction queue, so the snapshot observed is always a
    /// fully committed one.
    pub async fn read_state<T, F>(&self, select: F) -> T
    where
        F: FnOnce(&StateDocument) -> T,
    {
        let current = self.inner.lock().await;
        select(&current)
    }

    /// Replace the backing file atomically: write a temp sibling, fsync,
    /// rename into place.
    async fn persist(&self, document: &StateDocument) -> StateResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(document)?;

        let tmp_path = self.path.with_file_name(format!(
            "{}.tmp.{}",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "state.json".to_string()),
            Uuid::new_v4()
        ));
        {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
        }
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}
