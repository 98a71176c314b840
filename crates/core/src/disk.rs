//! Free-space capability.

use std::path::Path;

/// Answers "how many bytes can still be written under this path".
pub trait FreeSpace: Send + Sync {
    fn available_bytes(&self, path: &Path) -> std::io::Result<u64>;
}

/// Queries the filesystem that holds `path`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemFreeSpace;

impl FreeSpace for FilesystemFreeSpace {
    fn available_bytes(&self, path: &Path) -> std::io::Result<u64> {
        fs2::available_space(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_free_space_for_existing_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(FilesystemFreeSpace.available_bytes(temp.path()).is_ok());
    }

    #[test]
    fn test_filesystem_free_space_for_missing_dir_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("does-not-exist");
        assert!(FilesystemFreeSpace.available_bytes(&missing).is_err());
    }
}
