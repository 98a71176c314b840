//! # Storage Node Core
//!
//! Core logic for a single-node file store:
//! - [`MetadataIndex`]: identifier → [`FileRecord`] map, one lock per access
//! - [`StorageEngine`]: upload, download, delete and status over a flat directory
//! - Transfer sessions ([`UploadSession`], [`DownloadSession`]) for one call each
//! - Pluggable identifier assignment ([`IdGenerator`]) and free-space queries ([`FreeSpace`])
//!
//! A file is either fully stored and indexed, or not indexed at all.
//!
//! **No API concerns**: gRPC servers, status codes and the CLI belong in `api-grpc` and
//! `storage-node-cli`.

pub mod config;
pub mod constants;
pub mod disk;
pub mod engine;
mod error;
pub mod id;
pub mod index;
mod locks;
pub mod session;

pub use config::CoreConfig;
pub use disk::{FilesystemFreeSpace, FreeSpace};
pub use engine::{DeleteOutcome, DownloadStream, NodeStatus, StorageEngine, UploadReceipt};
pub use error::{StorageError, StorageResult};
pub use id::{HashIdGenerator, IdGenerator};
pub use index::{FileRecord, MetadataIndex};
pub use session::{CompletedUpload, DownloadChunk, DownloadSession, UploadChunk, UploadSession};
