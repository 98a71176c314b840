//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the storage engine. Request handling never reads process-wide environment
//! variables, which keeps several nodes in one process (as the tests do) independent.

use crate::{StorageError, StorageResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    node_id: String,
    storage_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The node identifier is trimmed and must not be empty. The storage directory is not
    /// touched here; [`crate::StorageEngine::open`] creates it.
    pub fn new(node_id: impl Into<String>, storage_dir: PathBuf) -> StorageResult<Self> {
        let node_id = node_id.into().trim().to_string();
        if node_id.is_empty() {
            return Err(StorageError::InvalidConfig("node_id cannot be empty".into()));
        }
        if storage_dir.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig(
                "storage_dir cannot be empty".into(),
            ));
        }

        Ok(Self {
            node_id,
            storage_dir,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

/// Resolve the node identifier from an optional configured value.
///
/// Falls back to `node-<hostname>` when a hostname is given, otherwise to
/// `node-<unix seconds>`.
pub fn node_id_from_env_value(value: Option<String>, hostname: Option<String>) -> String {
    let configured = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    if let Some(node_id) = configured {
        return node_id;
    }

    match hostname.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()) {
        Some(host) => format!("node-{}", host),
        None => format!("node-{}", chrono::Utc::now().timestamp()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_config_rejects_blank_node_id() {
        let result = CoreConfig::new("   ", PathBuf::from("storage"));
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn test_core_config_rejects_empty_storage_dir() {
        let result = CoreConfig::new("node-a", PathBuf::new());
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn test_core_config_trims_node_id() {
        let cfg = CoreConfig::new(" node-a ", PathBuf::from("storage")).unwrap();
        assert_eq!(cfg.node_id(), "node-a");
        assert_eq!(cfg.storage_dir(), Path::new("storage"));
    }

    #[test]
    fn test_node_id_prefers_configured_value() {
        let id = node_id_from_env_value(Some("edge-7".into()), Some("box".into()));
        assert_eq!(id, "edge-7");
    }

    #[test]
    fn test_node_id_falls_back_to_hostname() {
        let id = node_id_from_env_value(Some("  ".into()), Some("box".into()));
        assert_eq!(id, "node-box");
    }

    #[test]
    fn test_node_id_falls_back_to_timestamp() {
        let id = node_id_from_env_value(None, None);
        let suffix = id.strip_prefix("node-").expect("prefixed");
        assert!(suffix.parse::<i64>().is_ok());
    }
}
