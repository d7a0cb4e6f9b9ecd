//! Upload metadata, user records, and snapshot views.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

/// Upload lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Upload is accepting chunks.
    Active,
    /// Client paused sending; chunks are still accepted if they arrive.
    Paused,
    /// All chunks assembled into the final artifact.
    Completed,
}

/// Timing of one chunk request, kept for the finalize sweep.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ended_at: OffsetDateTime,
    pub bytes: u64,
    pub duration_seconds: f64,
}

/// Transfer statistics for one upload.
///
/// Accumulated incrementally as chunks arrive; the active/downtime split
/// and the concurrency figures are recomputed from the per-chunk events
/// by the finalize sweep, which is authoritative.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadStats {
    /// Total payload bytes received, counting each index once.
    pub bytes_received: u64,
    /// Seconds spent actively transferring.
    pub upload_active_seconds: f64,
    /// Seconds lost to gaps longer than the downtime threshold.
    pub downtime_seconds: f64,
    /// Seconds spent streaming parts into the final artifact.
    pub assembly_seconds: f64,
    /// Integral of concurrency over active time.
    pub concurrency_cumulative_seconds: f64,
    /// Highest number of chunk requests observed in flight.
    pub peak_concurrency: u32,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_chunk_at: Option<OffsetDateTime>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_activity_end: Option<OffsetDateTime>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_start: Option<OffsetDateTime>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_end: Option<OffsetDateTime>,
}

impl UploadStats {
    /// Average throughput in bytes per second over active time.
    pub fn avg_upload_bps(&self) -> Option<f64> {
        (self.upload_active_seconds > 0.0)
            .then(|| self.bytes_received as f64 / self.upload_active_seconds)
    }

    /// Average concurrency over active time.
    pub fn avg_concurrency(&self) -> Option<f64> {
        (self.upload_active_seconds > 0.0)
            .then(|| self.concurrency_cumulative_seconds / self.upload_active_seconds)
    }
}

/// Metadata for one in-flight upload.
///
/// Persistent uploads live inside the owner's [`UserRecord`] in the state
/// document; ephemeral uploads (`persist = false`) live only in process
/// memory and are lost on restart.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    /// Upload id, unique across all users.
    pub id: String,
    /// Owning user key.
    pub user_key: String,
    /// Raw client-supplied filename (sanitized only at assembly).
    pub file_name: String,
    /// Total file size in bytes.
    pub file_size: u64,
    /// Chunk size in bytes; the last chunk may be shorter.
    pub chunk_size: u64,
    /// ceil(file_size / chunk_size), fixed at creation.
    pub total_chunks: u64,
    /// Whether metadata is written to the durable state document.
    pub persist: bool,
    /// Current lifecycle status.
    pub status: UploadStatus,
    /// Indices of chunks whose bytes are on disk.
    pub received_chunks: BTreeSet<u64>,
    /// Transfer statistics, refined at finalize.
    #[serde(default)]
    pub stats: UploadStats,
    /// Per-chunk request timings keyed by index, input to the finalize
    /// sweep.
    #[serde(default)]
    pub chunk_events: BTreeMap<u64, ChunkEvent>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<OffsetDateTime>,
}

impl UploadMetadata {
    /// Create metadata for a new upload. Fails unless both sizes are
    /// positive.
    pub fn new(
        id: String,
        user_key: String,
        file_name: String,
        file_size: i64,
        chunk_size: i64,
        persist: bool,
        now: OffsetDateTime,
    ) -> Result<Self> {
        if file_size <= 0 || chunk_size <= 0 {
            return Err(Error::InvalidSizes {
                file_size,
                chunk_size,
            });
        }
        let file_size = file_size as u64;
        let chunk_size = chunk_size as u64;
        Ok(Self {
            id,
            user_key,
            file_name,
            file_size,
            chunk_size,
            total_chunks: file_size.div_ceil(chunk_size),
            persist,
            status: UploadStatus::Active,
            received_chunks: BTreeSet::new(),
            stats: UploadStats::default(),
            chunk_events: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    /// Sorted ascending list of chunk indices not yet received.
    pub fn missing_chunks(&self) -> Vec<u64> {
        (0..self.total_chunks)
            .filter(|i| !self.received_chunks.contains(i))
            .collect()
    }

    /// Number of chunks received so far.
    pub fn received_count(&self) -> u64 {
        self.received_chunks.len() as u64
    }

    /// True once every chunk index has been marked.
    pub fn is_complete(&self) -> bool {
        self.received_chunks.len() as u64 == self.total_chunks
    }

    /// Mark a chunk as received and refresh the activity timestamps.
    ///
    /// Returns `true` if the index was newly inserted; re-marking an
    /// already-received index is a no-op that still succeeds. The status
    /// flips back to active so a chunk arriving after a pause reactivates
    /// the upload.
    pub fn mark_received(&mut self, index: u64, now: OffsetDateTime) -> Result<bool> {
        if index >= self.total_chunks {
            return Err(Error::ChunkOutOfRange {
                index,
                total: self.total_chunks,
            });
        }
        let inserted = self.received_chunks.insert(index);
        self.status = UploadStatus::Active;
        self.updated_at = now;
        Ok(inserted)
    }

    /// Fold one chunk request into the transfer statistics.
    ///
    /// Bytes count only the first time an index lands; the timing event
    /// for the index is always replaced. A gap since the previous
    /// request longer than [`crate::DOWNTIME_THRESHOLD_SECONDS`] counts
    /// as downtime, a shorter one as active time.
    pub fn record_transfer(
        &mut self,
        index: u64,
        bytes: u64,
        started_at: OffsetDateTime,
        ended_at: OffsetDateTime,
        newly_received: bool,
    ) {
        let ended_at = ended_at.max(started_at);
        let duration = (ended_at - started_at).as_seconds_f64();
        self.chunk_events.insert(
            index,
            ChunkEvent {
                started_at,
                ended_at,
                bytes,
                duration_seconds: duration,
            },
        );

        if newly_received {
            self.stats.bytes_received += bytes;
        }

        match self.stats.last_activity_end {
            Some(last_end) => {
                let gap = (started_at - last_end).as_seconds_f64();
                if gap > crate::DOWNTIME_THRESHOLD_SECONDS {
                    self.stats.downtime_seconds += gap;
                } else {
                    self.stats.upload_active_seconds += gap.max(0.0);
                }
            }
            None => self.stats.first_chunk_at = Some(ended_at),
        }
        self.stats.upload_active_seconds += duration;
        self.stats.last_activity_end = Some(ended_at);
    }

    /// Recompute the statistics from the per-chunk events with an event
    /// sweep: union active time, cumulative and peak concurrency, and
    /// the downtime left between the first and last request.
    ///
    /// The sweep is authoritative and replaces the incrementally
    /// accumulated figures; overlapping requests that the incremental
    /// pass double-counted collapse to their union here.
    pub fn finalize_stats(&mut self, assembly_seconds: f64) {
        let mut events: Vec<(OffsetDateTime, i32)> = Vec::with_capacity(self.chunk_events.len() * 2);
        for event in self.chunk_events.values() {
            events.push((event.started_at, 1));
            events.push((event.ended_at.max(event.started_at), -1));
        }
        events.sort();

        let mut union_active = 0.0;
        let mut cumulative = 0.0;
        let mut peak: i32 = 0;
        let mut current: i32 = 0;
        let mut upload_start = None;
        let mut upload_end = None;

        if let Some(&(first, _)) = events.first() {
            upload_start = Some(first);
            let mut last_t = first;
            for &(t, delta) in &events {
                if t > last_t {
                    let interval = (t - last_t).as_seconds_f64();
                    if current > 0 {
                        union_active += interval;
                        cumulative += current as f64 * interval;
                    }
                    last_t = t;
                }
                current += delta;
                peak = peak.max(current);
            }
            upload_end = Some(last_t);
        }

        let downtime = match (upload_start, upload_end) {
            (Some(start), Some(end)) if end >= start => {
                ((end - start).as_seconds_f64() - union_active).max(0.0)
            }
            _ => 0.0,
        };

        self.stats.upload_start = upload_start;
        self.stats.upload_end = upload_end;
        self.stats.upload_active_seconds = union_active;
        self.stats.concurrency_cumulative_seconds = cumulative;
        self.stats.peak_concurrency = peak.max(0) as u32;
        self.stats.downtime_seconds = downtime;
        self.stats.assembly_seconds = assembly_seconds;
    }
}

/// Wire view of an upload: the metadata decorated with the derived
/// `missingChunks` and `receivedCount` fields. Never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadView {
    #[serde(flatten)]
    pub meta: UploadMetadata,
    pub missing_chunks: Vec<u64>,
    pub received_count: u64,
    #[serde(default)]
    pub avg_upload_bps: Option<f64>,
    #[serde(default)]
    pub avg_concurrency: Option<f64>,
}

impl UploadView {
    pub fn of(meta: &UploadMetadata) -> Self {
        Self {
            missing_chunks: meta.missing_chunks(),
            received_count: meta.received_count(),
            avg_upload_bps: meta.stats.avg_upload_bps(),
            avg_concurrency: meta.stats.avg_concurrency(),
            meta: meta.clone(),
        }
    }
}

/// Terminal, immutable summary of a completed or cancelled upload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
    pub persist: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

impl HistoryEntry {
    /// Build the terminal summary for an upload leaving the live set.
    pub fn from_upload(meta: &UploadMetadata, completed_at: OffsetDateTime) -> Self {
        Self {
            id: meta.id.clone(),
            file_name: meta.file_name.clone(),
            file_size: meta.file_size,
            chunk_size: meta.chunk_size,
            total_chunks: meta.total_chunks,
            persist: meta.persist,
            completed_at,
        }
    }
}

/// A user's durable record: in-flight persistent uploads plus capped
/// history. Created on first identify, never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// In-flight persistent uploads keyed by upload id.
    #[serde(default)]
    pub uploads: BTreeMap<String, UploadMetadata>,
    /// Terminal entries, newest first, capped at [`crate::HISTORY_CAP`].
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl UserRecord {
    pub fn new(key: String, now: OffsetDateTime) -> Self {
        Self {
            key,
            created_at: now,
            uploads: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// Prepend a history entry, trimming to the retention cap.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
        self.history.truncate(crate::HISTORY_CAP);
    }
}

/// The triple returned to clients for a given user.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub active: Vec<UploadView>,
    pub paused: Vec<UploadView>,
    pub history: Vec<HistoryEntry>,
}
