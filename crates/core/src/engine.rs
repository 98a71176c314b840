//! Storage engine: upload, download, delete and status over a flat directory of files.
//!
//! # Consistency
//!
//! A [`FileRecord`] is inserted only after the upload's bytes are synced and moved onto their
//! final path, and it is removed from the index before the file is unlinked. Both index
//! mutations are single critical sections in [`MetadataIndex`]; no disk I/O happens while the
//! index lock is held.
//!
//! The commit of an upload (rename, stat, index insert) and a delete (index removal, unlink)
//! hold the lock of their identifier, so a record exists exactly when its file does and its
//! size describes that file. Downloads take no lock. A download that looked up its record
//! before a concurrent delete keeps streaming from its open handle; one that looks up
//! afterwards gets [`StorageError::NotFound`].

use crate::config::CoreConfig;
use crate::constants::DELETE_SUCCESS_MESSAGE;
use crate::constants::UPLOAD_SUCCESS_MESSAGE;
use crate::disk::{FilesystemFreeSpace, FreeSpace};
use crate::id::{HashIdGenerator, IdGenerator};
use crate::index::{FileRecord, MetadataIndex};
use crate::locks::IdLocks;
use crate::session::{DownloadChunk, DownloadSession, UploadChunk, UploadSession};
use crate::{StorageError, StorageResult};
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

/// Chunks of one download, in increasing `chunk_number` order.
pub type DownloadStream = Pin<Box<dyn Stream<Item = StorageResult<DownloadChunk>> + Send>>;

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: String,
    pub size: u64,
    pub message: String,
}

/// Structured result of a delete. Produced for every delete, including unknown identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: String,
}

/// Node status, computed fresh on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatus {
    pub node_id: String,
    pub files_stored: usize,
    pub disk_space_available: u64,
    pub healthy: bool,
}

/// Orchestrates transfers between callers, the filesystem and the metadata index.
#[derive(Clone)]
pub struct StorageEngine {
    config: Arc<CoreConfig>,
    index: Arc<MetadataIndex>,
    ids: Arc<dyn IdGenerator>,
    free_space: Arc<dyn FreeSpace>,
    locks: Arc<IdLocks>,
}

impl StorageEngine {
    /// Creates the storage directory if needed and returns an engine with an empty index,
    /// hash-based identifiers and filesystem free-space queries.
    pub fn open(config: CoreConfig) -> StorageResult<Self> {
        std::fs::create_dir_all(config.storage_dir()).map_err(StorageError::StorageDirCreation)?;

        let ids = Arc::new(HashIdGenerator::new(config.node_id()));
        Ok(Self {
            config: Arc::new(config),
            index: Arc::new(MetadataIndex::new()),
            ids,
            free_space: Arc::new(FilesystemFreeSpace),
            locks: Arc::new(IdLocks::new()),
        })
    }

    pub fn with_index(mut self, index: Arc<MetadataIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_free_space(mut self, free_space: Arc<dyn FreeSpace>) -> Self {
        self.free_space = free_space;
        self
    }

    pub fn node_id(&self) -> &str {
        self.config.node_id()
    }

    pub fn storage_dir(&self) -> &Path {
        self.config.storage_dir()
    }

    pub fn index(&self) -> &Arc<MetadataIndex> {
        &self.index
    }

    /// Starts a session for one upload call.
    pub fn upload_session(&self) -> UploadSession {
        UploadSession::new(self.config.storage_dir(), Arc::clone(&self.ids))
    }

    /// Receives one upload stream.
    ///
    /// Chunks are appended in the order received. The record is indexed only once the stream
    /// ends normally. A stream error, write failure or invalid identifier aborts the session,
    /// which removes the staged bytes, and leaves the index untouched.
    pub async fn upload<S, E>(&self, mut chunks: S) -> StorageResult<UploadReceipt>
    where
        S: Stream<Item = Result<UploadChunk, E>> + Unpin,
        E: Display,
    {
        let mut session = self.upload_session();

        while let Some(item) = chunks.next().await {
            let outcome = match item {
                Ok(chunk) => session.accept(chunk).await,
                Err(e) => Err(StorageError::Transport(e.to_string())),
            };
            if let Err(e) = outcome {
                session.abort().await;
                return Err(e);
            }
        }

        let id = session.prepare().await?;
        let _commit = self.locks.lock(&id).await;
        let done = session.finish().await?;
        let record = FileRecord {
            id: done.id.clone(),
            location: done.location,
            size: done.size,
            uploaded_at: Utc::now(),
        };
        if self.index.put(done.id.clone(), record).is_some() {
            tracing::info!("file {} replaced", done.id);
        }
        tracing::info!("file {} stored, size: {} bytes", done.id, done.size);

        Ok(UploadReceipt {
            id: done.id,
            size: done.size,
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
        })
    }

    /// Opens a stored file for streaming.
    ///
    /// Fails before yielding anything with [`StorageError::NotFound`] for an unknown identifier,
    /// or [`StorageError::FileOpen`] if the indexed file cannot be opened. A read failure
    /// mid-stream is yielded as the last item.
    pub async fn download(&self, id: &str) -> StorageResult<DownloadStream> {
        let record = self
            .index
            .get(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        let mut session = DownloadSession::open(record.id, &record.location).await?;
        tracing::info!("streaming file {} to client", id);

        let stream = async_stream::try_stream! {
            while let Some(chunk) = session.next_chunk().await? {
                yield chunk;
            }
            tracing::info!(
                "completed sending file, total chunks: {}",
                session.chunks_sent()
            );
        };

        Ok(Box::pin(stream))
    }

    /// Removes a file from the index, then from disk.
    ///
    /// If the unlink fails the record stays removed; the outcome reports the failure.
    pub async fn delete(&self, id: &str) -> DeleteOutcome {
        let _guard = self.locks.lock(id).await;
        let Some(record) = self.index.remove(id) else {
            return DeleteOutcome {
                success: false,
                message: format!("File not found: {}", id),
            };
        };

        if let Err(e) = tokio::fs::remove_file(&record.location).await {
            tracing::error!("file {} unindexed but not removed from disk: {}", id, e);
            return DeleteOutcome {
                success: false,
                message: StorageError::FileRemove(e).to_string(),
            };
        }

        tracing::info!("deleted file: {}", id);
        DeleteOutcome {
            success: true,
            message: DELETE_SUCCESS_MESSAGE.to_string(),
        }
    }

    /// Current file count and free space under the storage root.
    pub async fn status(&self) -> StorageResult<NodeStatus> {
        let free_space = Arc::clone(&self.free_space);
        let root = self.config.storage_dir().to_path_buf();
        let available = tokio::task::spawn_blocking(move || free_space.available_bytes(&root))
            .await
            .map_err(|e| {
                StorageError::FreeSpace(std::io::Error::other(format!(
                    "spawn_blocking failed: {e}"
                )))
            })?
            .map_err(StorageError::FreeSpace)?;

        Ok(NodeStatus {
            node_id: self.config.node_id().to_string(),
            files_stored: self.index.count(),
            disk_space_available: available,
            healthy: true,
        })
    }
}
