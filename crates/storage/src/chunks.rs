//! Scratch chunk files and final-artifact assembly.

use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use filedrop_core::{UploadMetadata, safe_file_name};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;
use uuid::Uuid;

/// Buffer size for streaming part files into the final artifact.
const COPY_BUF_SIZE: usize = 1024 * 1024;

/// Metadata for one finalized artifact in the output directory.
#[derive(Clone, Debug)]
pub struct ArtifactEntry {
    /// File name within the output directory.
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, if the filesystem reports one.
    pub modified_at: Option<OffsetDateTime>,
}

/// Filesystem layout holding chunk bytes and assembled artifacts.
pub struct ChunkStore {
    upload_dir: PathBuf,
    final_dir: PathBuf,
}

impl ChunkStore {
    /// Create a store over the two directory roots. Directories are
    /// created lazily by the operations that need them.
    pub fn new(upload_dir: impl Into<PathBuf>, final_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            final_dir: final_dir.into(),
        }
    }

    /// Root of the finalized-artifact directory.
    pub fn final_dir(&self) -> &Path {
        &self.final_dir
    }

    /// Final artifact path for an upload: `<finalDir>/<id>-<safeFileName>`.
    pub fn final_path(&self, upload_id: &str, file_name: &str) -> PathBuf {
        self.final_dir
            .join(format!("{upload_id}-{}", safe_file_name(file_name)))
    }

    fn scratch_dir(&self, upload_id: &str) -> StorageResult<PathBuf> {
        validate_upload_id(upload_id)?;
        Ok(self.upload_dir.join(upload_id))
    }

    fn part_path(&self, upload_id: &str, index: u64) -> StorageResult<PathBuf> {
        Ok(self.scratch_dir(upload_id)?.join(format!("{index}.part")))
    }

    /// Ensure the scratch directory for an upload exists.
    #[instrument(skip(self))]
    pub async fn create_scratch(&self, upload_id: &str) -> StorageResult<()> {
        let dir = self.scratch_dir(upload_id)?;
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    /// Write one chunk's bytes, idempotently.
    ///
    /// If the part file already exists the write is skipped and the first
    /// payload wins. Returns `true` when bytes were actually written. The
    /// write goes through a temp sibling and a rename, so an aborted
    /// request leaves the part either absent or fully present.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn write_chunk(&self, upload_id: &str, index: u64, data: Bytes) -> StorageResult<bool> {
        let path = self.part_path(upload_id, index)?;
        if fs::try_exists(&path).await? {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_file_name(format!("{index}.part.tmp.{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&tmp_path, &path).await?;
        Ok(true)
    }

    /// Whether a part file exists for the given index.
    pub async fn chunk_exists(&self, upload_id: &str, index: u64) -> StorageResult<bool> {
        let path = self.part_path(upload_id, index)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Assemble the final artifact from scratch parts.
    ///
    /// Streams parts in strictly ascending index order into a temp file,
    /// verifies the byte count against the recorded file size, renames
    /// into place, then removes the scratch directory. A missing part
    /// aborts without leaving anything at the final path.
    #[instrument(skip(self, meta), fields(upload_id = %meta.id, total_chunks = meta.total_chunks))]
    pub async fn assemble(&self, meta: &UploadMetadata) -> StorageResult<PathBuf> {
        let scratch = self.scratch_dir(&meta.id)?;
        fs::create_dir_all(&self.final_dir).await?;

        let final_path = self.final_path(&meta.id, &meta.file_name);
        let tmp_path =
            final_path.with_file_name(format!("{}.assembling.{}", meta.id, Uuid::new_v4()));

        let result = self
            .assemble_into(&scratch, &tmp_path, meta.total_chunks, meta.file_size)
            .await;
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        fs::rename(&tmp_path, &final_path).await?;
        fs::remove_dir_all(&scratch).await?;

        tracing::info!(path = %final_path.display(), "artifact assembled");
        Ok(final_path)
    }

    async fn assemble_into(
        &self,
        scratch: &Path,
        tmp_path: &Path,
        total_chunks: u64,
        expected_size: u64,
    ) -> StorageResult<()> {
        let mut out = fs::File::create(tmp_path).await?;
        let mut written: u64 = 0;
        let mut buf = vec![0u8; COPY_BUF_SIZE];

        for index in 0..total_chunks {
            let part = scratch.join(format!("{index}.part"));
            let mut file = match fs::File::open(&part).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::MissingChunk { index });
                }
                Err(e) => return Err(StorageError::Io(e)),
            };
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n]).await?;
                written += n as u64;
            }
        }

        if written != expected_size {
            return Err(StorageError::SizeMismatch {
                expected: expected_size,
                actual: written,
            });
        }

        out.sync_all().await?;
        Ok(())
    }

    /// List finalized artifacts in the output directory, sorted by file
    /// name. An absent output directory lists as empty. Subdirectories
    /// and other non-files are skipped.
    #[instrument(skip(self))]
    pub async fn list_artifacts(&self) -> StorageResult<Vec<ArtifactEntry>> {
        let mut entries = Vec::new();
        let mut dir = match fs::read_dir(&self.final_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(StorageError::Io(e)),
        };

        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_file() {
                continue;
            }
            let metadata = entry.metadata().await?;
            entries.push(ArtifactEntry {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                modified_at: metadata.modified().ok().map(OffsetDateTime::from),
            });
        }

        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    /// Recursively remove an upload's scratch directory. Removing an
    /// already-absent directory succeeds.
    #[instrument(skip(self))]
    pub async fn purge_scratch(&self, upload_id: &str) -> StorageResult<()> {
        let dir = self.scratch_dir(upload_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Upload ids come from the alphanumeric id factory; anything else is
/// rejected before it can reach a path join.
fn validate_upload_id(upload_id: &str) -> StorageResult<()> {
    if upload_id.is_empty() || !upload_id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(StorageError::InvalidId(upload_id.to_string()));
    }
    Ok(())
}
