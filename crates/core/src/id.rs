//! File identifier assignment and validation.

use crate::constants::MAX_IDENTIFIER_LEN;
use crate::{StorageError, StorageResult};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicI64, Ordering};

/// Strategy for naming uploads that arrive without a client-supplied identifier.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default strategy: SHA-256 of `"{node_id}-{unix_nanos}"`, as 64 lowercase hex characters.
///
/// The nanosecond value is forced to increase strictly between calls, so two uploads started
/// within the same clock tick still get distinct identifiers.
#[derive(Debug)]
pub struct HashIdGenerator {
    node_id: String,
    last_nanos: AtomicI64,
}

impl HashIdGenerator {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            last_nanos: AtomicI64::new(i64::MIN),
        }
    }

    fn next_nanos(&self) -> i64 {
        let now = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(i64::MAX - 1);
        let mut last = self.last_nanos.load(Ordering::Relaxed);
        loop {
            let next = if now > last { now } else { last + 1 };
            match self.last_nanos.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Hashes the seed for a given instant. Exposed for deterministic tests.
    pub fn derive(node_id: &str, nanos: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}-{}", node_id, nanos).as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl IdGenerator for HashIdGenerator {
    fn generate(&self) -> String {
        Self::derive(&self.node_id, self.next_nanos())
    }
}

/// Checks that a client-supplied identifier is safe to use as a flat file name under the
/// storage root.
pub fn validate_identifier(id: &str) -> StorageResult<()> {
    let reject = |reason: &str| {
        Err(StorageError::InvalidIdentifier(format!(
            "{} ({:?})",
            reason, id
        )))
    };

    if id.is_empty() {
        return reject("identifier is empty");
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return reject("identifier is too long");
    }
    if id.starts_with('.') {
        return reject("identifier must not start with '.'");
    }
    if id.contains(['/', '\\', '\0']) {
        return reject("identifier must not contain path separators");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_id_is_64_lowercase_hex() {
        let id = HashIdGenerator::new("node-a").generate();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = HashIdGenerator::derive("node-a", 42);
        let b = HashIdGenerator::derive("node-a", 42);
        let c = HashIdGenerator::derive("node-b", 42);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_generated_ids_are_unique_in_a_tight_loop() {
        let generator = HashIdGenerator::new("node-a");
        let ids: std::collections::HashSet<String> =
            (0..1_000).map(|_| generator.generate()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn test_validate_identifier_accepts_plain_names() {
        for id in ["a", "b", " a ", "report-2024.pdf", "ABC_123", "a.partial-123"] {
            assert!(validate_identifier(id).is_ok(), "{} should be valid", id);
        }
    }

    #[test]
    fn test_validate_identifier_length_boundary() {
        let longest = "x".repeat(MAX_IDENTIFIER_LEN);
        assert!(validate_identifier(&longest).is_ok());
        assert!(matches!(
            validate_identifier(&format!("{}x", longest)),
            Err(StorageError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_validate_identifier_rejects_unsafe_names() {
        let too_long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        for id in [
            "",
            ".",
            "..",
            ".hidden",
            "../etc/passwd",
            "a/b",
            "a\\b",
            "nul\0byte",
            too_long.as_str(),
        ] {
            assert!(
                matches!(
                    validate_identifier(id),
                    Err(StorageError::InvalidIdentifier(_))
                ),
                "{:?} should be rejected",
                id
            );
        }
    }
}
