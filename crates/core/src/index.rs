//! In-memory metadata index.
//!
//! Maps file identifiers to [`FileRecord`]s. Every operation takes the same lock, so a
//! lookup-then-mutate sequence such as [`MetadataIndex::remove`] is atomic with respect to
//! every other access. The lock is only ever held for the in-memory update; callers do their
//! disk I/O before or after, never while holding it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

/// One fully stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    /// Final on-disk location. Owned by the storage engine.
    pub location: PathBuf,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Identifier → record map guarded by a single mutex.
///
/// Constructed once and handed to the engine (usually behind an `Arc`), so tests can run
/// several independent nodes in one process.
#[derive(Debug, Default)]
pub struct MetadataIndex {
    records: Mutex<HashMap<String, FileRecord>>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the record for `id`, returning the one it replaced.
    pub fn put(&self, id: impl Into<String>, record: FileRecord) -> Option<FileRecord> {
        self.records.lock().insert(id.into(), record)
    }

    pub fn get(&self, id: &str) -> Option<FileRecord> {
        self.records.lock().get(id).cloned()
    }

    /// Looks up and removes `id` in one critical section.
    pub fn remove(&self, id: &str) -> Option<FileRecord> {
        self.records.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.lock().contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }
}
