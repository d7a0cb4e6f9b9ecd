//! Filesystem storage for the filedrop upload service.
//!
//! Chunk bytes live under a scratch directory keyed by upload id
//! (`<uploadDir>/<id>/<i>.part`); assembled artifacts land in a separate
//! output directory (`<finalDir>/<id>-<safeFileName>`).

pub mod chunks;
pub mod error;

pub use chunks::{ArtifactEntry, ChunkStore};
pub use error::{StorageError, StorageResult};
