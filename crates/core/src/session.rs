//! Per-call transfer state.
//!
//! An [`UploadSession`] lives for exactly one upload call. Bytes go to a staging file next to
//! the final location and are moved into place only by [`UploadSession::finish`], so nothing
//! outside the session ever sees a partially written file under its final name. A session that
//! is aborted, or simply dropped because the call went away, removes its staging file.
//!
//! A [`DownloadSession`] owns one open file and hands it out block by block.

use crate::constants::{DOWNLOAD_BLOCK_SIZE, STAGING_SUFFIX};
use crate::id::{validate_identifier, IdGenerator};
use crate::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// One chunk of an incoming upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadChunk {
    /// Only read from the first chunk of a stream.
    pub id: Option<String>,
    pub content: Vec<u8>,
}

impl UploadChunk {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            id: None,
            content: content.into(),
        }
    }

    pub fn with_id(id: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Some(id.into()),
            content: content.into(),
        }
    }
}

/// One chunk of an outgoing download. Numbering starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadChunk {
    pub id: String,
    pub content: Vec<u8>,
    pub chunk_number: i32,
}

/// A finished upload that has been moved to its final location but not yet indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub id: String,
    pub location: PathBuf,
    pub size: u64,
}

#[derive(Debug)]
struct StagedFile {
    id: String,
    file: fs::File,
    staging_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[derive(Debug)]
enum UploadState {
    AwaitingFirstChunk,
    Receiving(StagedFile),
    Closed,
}

/// State machine for one upload: `AwaitingFirstChunk → Receiving → (finish | abort)`.
pub struct UploadSession {
    root: PathBuf,
    ids: Arc<dyn IdGenerator>,
    state: UploadState,
}

impl UploadSession {
    pub fn new(root: impl Into<PathBuf>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            root: root.into(),
            ids,
            state: UploadState::AwaitingFirstChunk,
        }
    }

    /// Identifier of the file being received, once the first chunk has been seen.
    pub fn id(&self) -> Option<&str> {
        match &self.state {
            UploadState::Receiving(staged) => Some(&staged.id),
            _ => None,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        match &self.state {
            UploadState::Receiving(staged) => staged.bytes_written,
            _ => 0,
        }
    }

    /// Appends one chunk. The first chunk also fixes the identifier and creates the staging
    /// file.
    ///
    /// On error the session should be [`abort`](Self::abort)ed.
    pub async fn accept(&mut self, chunk: UploadChunk) -> StorageResult<()> {
        if matches!(self.state, UploadState::AwaitingFirstChunk) {
            let id = self.resolve_id(chunk.id)?;
            self.state = UploadState::Receiving(self.stage(id).await?);
        }

        let UploadState::Receiving(staged) = &mut self.state else {
            return Err(StorageError::FileWrite(std::io::Error::other(
                "upload session is closed",
            )));
        };

        staged
            .file
            .write_all(&chunk.content)
            .await
            .map_err(StorageError::FileWrite)?;
        staged.bytes_written += chunk.content.len() as u64;
        tracing::debug!(
            "received {} bytes for {} ({} total)",
            chunk.content.len(),
            staged.id,
            staged.bytes_written
        );
        Ok(())
    }

    /// Fixes the identifier and returns it, staging an empty file under a generated
    /// identifier if no chunk has arrived yet.
    pub async fn prepare(&mut self) -> StorageResult<String> {
        if matches!(self.state, UploadState::AwaitingFirstChunk) {
            let id = self.ids.generate();
            self.state = UploadState::Receiving(self.stage(id).await?);
        }

        match &self.state {
            UploadState::Receiving(staged) => Ok(staged.id.clone()),
            _ => Err(StorageError::FileWrite(std::io::Error::other(
                "upload session is closed",
            ))),
        }
    }

    /// Flushes the staging file and moves it onto its final location.
    ///
    /// A stream that ended before any chunk arrived produces an empty file under a generated
    /// identifier.
    pub async fn finish(mut self) -> StorageResult<CompletedUpload> {
        self.prepare().await?;

        let UploadState::Receiving(mut staged) =
            std::mem::replace(&mut self.state, UploadState::Closed)
        else {
            return Err(StorageError::FileWrite(std::io::Error::other(
                "upload session is closed",
            )));
        };

        if let Err(e) = flush_and_sync(&mut staged.file).await {
            discard_staging(staged.file, &staged.staging_path).await;
            return Err(StorageError::FileWrite(e));
        }
        drop(staged.file);

        if let Err(e) = fs::rename(&staged.staging_path, &staged.final_path).await {
            remove_staging(&staged.staging_path).await;
            return Err(StorageError::FileRename(e));
        }

        let size = fs::metadata(&staged.final_path)
            .await
            .map_err(StorageError::FileStat)?
            .len();

        Ok(CompletedUpload {
            id: staged.id,
            location: staged.final_path,
            size,
        })
    }

    /// Releases the file handle and removes whatever was staged so far.
    pub async fn abort(mut self) {
        if let UploadState::Receiving(staged) =
            std::mem::replace(&mut self.state, UploadState::Closed)
        {
            tracing::warn!(
                "aborting upload of {} after {} bytes",
                staged.id,
                staged.bytes_written
            );
            discard_staging(staged.file, &staged.staging_path).await;
        }
    }

    fn resolve_id(&self, supplied: Option<String>) -> StorageResult<String> {
        match supplied {
            Some(id) if !id.is_empty() => {
                validate_identifier(&id)?;
                Ok(id)
            }
            _ => Ok(self.ids.generate()),
        }
    }

    async fn stage(&self, id: String) -> StorageResult<StagedFile> {
        let final_path = self.root.join(&id);
        let staging_path = self.root.join(format!(
            ".{}{}",
            uuid::Uuid::new_v4().simple(),
            STAGING_SUFFIX
        ));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging_path)
            .await
            .map_err(StorageError::FileCreate)?;

        tracing::info!("started receiving file with ID: {}", id);
        Ok(StagedFile {
            id,
            file,
            staging_path,
            final_path,
            bytes_written: 0,
        })
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        // Reached when the call is cancelled without finish/abort running.
        if let UploadState::Receiving(staged) =
            std::mem::replace(&mut self.state, UploadState::Closed)
        {
            drop(staged.file);
            let path = staged.staging_path;
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(move || remove_staging_blocking(&path));
                }
                Err(_) => remove_staging_blocking(&path),
            }
        }
    }
}

fn remove_staging_blocking(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!("failed to remove staging file {}: {}", path.display(), e);
    }
}

async fn flush_and_sync(file: &mut fs::File) -> std::io::Result<()> {
    file.flush().await?;
    file.sync_all().await
}

async fn discard_staging(file: fs::File, path: &Path) {
    drop(file);
    remove_staging(path).await;
}

async fn remove_staging(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        tracing::warn!("failed to remove staging file {}: {}", path.display(), e);
    }
}

/// Reads one stored file as a sequence of numbered chunks.
#[derive(Debug)]
pub struct DownloadSession {
    id: String,
    file: fs::File,
    buffer: Vec<u8>,
    next_chunk_number: i32,
}

impl DownloadSession {
    /// Opens `location` for reading.
    pub async fn open(id: impl Into<String>, location: &Path) -> StorageResult<Self> {
        Self::open_with_block_size(id, location, DOWNLOAD_BLOCK_SIZE).await
    }

    pub async fn open_with_block_size(
        id: impl Into<String>,
        location: &Path,
        block_size: usize,
    ) -> StorageResult<Self> {
        let file = fs::File::open(location)
            .await
            .map_err(StorageError::FileOpen)?;
        Ok(Self {
            id: id.into(),
            file,
            buffer: vec![0u8; block_size.max(1)],
            next_chunk_number: 1,
        })
    }

    /// Number of chunks handed out so far.
    pub fn chunks_sent(&self) -> i32 {
        self.next_chunk_number - 1
    }

    /// Returns the next block, or `None` at end of file.
    ///
    /// Every block is full except possibly the last one.
    pub async fn next_chunk(&mut self) -> StorageResult<Option<DownloadChunk>> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            let n = self
                .file
                .read(&mut self.buffer[filled..])
                .await
                .map_err(StorageError::FileRead)?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        let chunk = DownloadChunk {
            id: self.id.clone(),
            content: self.buffer[..filled].to_vec(),
            chunk_number: self.next_chunk_number,
        };
        self.next_chunk_number += 1;
        Ok(Some(chunk))
    }
}
