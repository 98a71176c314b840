//! Constants used throughout the storage node core crate.

/// Default directory for stored files when no explicit directory is configured.
pub const DEFAULT_STORAGE_DIR: &str = "storage";

/// Size of each block read from disk and sent as one download chunk.
///
/// Tunable; clients must not depend on it.
pub const DOWNLOAD_BLOCK_SIZE: usize = 1024 * 1024;

/// Suffix of the staging file an in-flight upload writes to (`.<uuid>.partial`).
///
/// Staging names have a fixed length and start with `.`, which client identifiers may not.
pub const STAGING_SUFFIX: &str = ".partial";

/// Longest identifier accepted from a client, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Message returned with a completed upload.
pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully";

/// Message returned with a completed delete.
pub const DELETE_SUCCESS_MESSAGE: &str = "File deleted successfully";
