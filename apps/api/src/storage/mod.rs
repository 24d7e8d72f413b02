//! Blob storage for artifacts and cached extractions.
//!
//! Keys are `/`-separated relative paths such as
//! `proposals/{id}/runs/{run}/requirements.md`.
//! `FsBlobStore` is used for local deployments and tests, `S3BlobStore` for
//! MinIO or AWS.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod fs;
pub mod s3;

pub use fs::FsBlobStore;
pub use s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("S3 error: {0}")]
    S3(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobMeta {
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `data` at `key`, replacing any previous content.
    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn stat(&self, key: &str) -> Result<BlobMeta, StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Deletes every blob whose key starts with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError>;

    /// Lists keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Rejects keys that could escape the storage root.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part == ".." || part == ".");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub fn proposal_prefix(proposal_id: uuid::Uuid) -> String {
    format!("proposals/{proposal_id}/")
}

/// Artifacts live under the run that wrote them, so a new run never
/// overwrites the files the stored record still points at.
pub fn artifact_key(proposal_id: uuid::Uuid, run_id: uuid::Uuid, name: &str) -> String {
    format!("proposals/{proposal_id}/runs/{run_id}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("proposals/a/b.md").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("a/./b").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn test_artifact_key_is_under_proposal_prefix() {
        let id = uuid::Uuid::new_v4();
        let first = artifact_key(id, uuid::Uuid::new_v4(), "variables.json");
        let second = artifact_key(id, uuid::Uuid::new_v4(), "variables.json");
        assert!(first.starts_with(&proposal_prefix(id)));
        assert!(validate_key(&first).is_ok());
        assert_ne!(first, second);
    }
}
