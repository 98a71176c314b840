#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("invalid file identifier: {0}")]
    InvalidIdentifier(String),
    #[error("error receiving chunk: {0}")]
    Transport(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to create file: {0}")]
    FileCreate(std::io::Error),
    #[error("failed to write chunk: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to open file: {0}")]
    FileOpen(std::io::Error),
    #[error("error reading file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to stat file: {0}")]
    FileStat(std::io::Error),
    #[error("failed to move file into place: {0}")]
    FileRename(std::io::Error),
    #[error("failed to delete file: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to get disk space: {0}")]
    FreeSpace(std::io::Error),
}

impl StorageError {
    /// True for failures of an underlying filesystem operation.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            StorageError::StorageDirCreation(_)
                | StorageError::FileCreate(_)
                | StorageError::FileWrite(_)
                | StorageError::FileOpen(_)
                | StorageError::FileRead(_)
                | StorageError::FileStat(_)
                | StorageError::FileRename(_)
                | StorageError::FileRemove(_)
                | StorageError::FreeSpace(_)
        )
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
