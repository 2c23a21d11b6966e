//! Artifact Record - reference to a persisted model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Artifact Record points a run at its stored Classifier State.
///
/// ## Hash Format
///
/// `content_hash` is `xxh3:<16 hex digits>` over the uncompressed artifact
/// bytes. Loading recomputes it and rejects any mismatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    key: String,
    content_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Describe `bytes` stored under `key`.
    #[must_use]
    pub fn describe(key: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            key: key.into(),
            content_hash: content_hash(bytes),
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
        }
    }

    /// Store key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Content hash, `xxh3:` prefixed.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Uncompressed size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// When the artifact was stored.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True if `bytes` hash to the recorded value.
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.size_bytes == bytes.len() as u64 && self.content_hash == content_hash(bytes)
    }
}

/// `xxh3:<hex>` digest of `bytes`.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    format!("xxh3:{:016x}", xxh3_64(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_hash_format() {
        let artifact = ArtifactRecord::describe("models/run-1.json", b"{}");
        assert!(artifact.content_hash().starts_with("xxh3:"));
        assert_eq!(artifact.content_hash().len(), "xxh3:".len() + 16);
        assert_eq!(artifact.size_bytes(), 2);
    }

    #[test]
    fn test_artifact_detects_corruption() {
        let artifact = ArtifactRecord::describe("k", b"model bytes");
        assert!(artifact.matches(b"model bytes"));
        assert!(!artifact.matches(b"model bytez"));
    }
}
