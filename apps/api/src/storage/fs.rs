use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use super::{validate_key, BlobMeta, BlobStore, StorageError};

/// Local filesystem blob store rooted at a base directory.
pub struct FsBlobStore {
    base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

fn io_err(key: &str, source: std::io::Error) -> StorageError {
    if source.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.full_path(key)?;
        debug!(key, size = data.len(), "blob write");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(key, e))?;
        }
        // Write beside the target and rename so readers never see a torn file.
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, data).await.map_err(|e| io_err(key, e))?;
        fs::rename(&tmp, &path).await.map_err(|e| io_err(key, e))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.full_path(key)?;
        debug!(key, "blob read");
        fs::read(&path).await.map_err(|e| io_err(key, e))
    }

    async fn stat(&self, key: &str) -> Result<BlobMeta, StorageError> {
        let path = self.full_path(key)?;
        let meta = fs::metadata(&path).await.map_err(|e| io_err(key, e))?;
        Ok(BlobMeta {
            size: meta.len(),
            modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.full_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(key, e)),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        for key in self.list(prefix).await? {
            self.delete(&key).await?;
        }
        // Drop the directory itself when the prefix names one.
        if prefix.ends_with('/') {
            let dir = self.full_path(prefix.trim_end_matches('/'))?;
            match fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(prefix, e)),
            }
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.base_path.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err(prefix, e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(prefix, e))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| io_err(prefix, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = relative_key(&self.base_path, &path) {
                    if key.starts_with(prefix) && !key.contains(".tmp-") {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
