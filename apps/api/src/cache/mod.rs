//! Markdown cache: previously extracted text, scoped per proposal.
//!
//! Entries live next to the proposal's artifacts as a pair of blobs:
//! `cache/{key}.md` (body) and `cache/{key}.json` (metadata). The metadata blob
//! is written last and acts as the commit marker. Entries older than
//! [`FRESHNESS_WINDOW_HOURS`] are treated as absent; nothing is ever updated in place.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extraction::ExtractedText;
use crate::storage::{BlobStore, StorageError};

pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cache_key: String,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
}

/// Hash of (filename, modification time). Without a modification time the
/// current wall clock is used, so the key is not reproducible for such files.
pub fn cache_key(filename: &str, modified_at: Option<DateTime<Utc>>) -> String {
    let stamp = match modified_at {
        Some(t) => t,
        None => {
            warn!(filename, "modification time unavailable, cache key falls back to now");
            Utc::now()
        }
    };
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update(b"\0");
    hasher.update(stamp.timestamp_millis().to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct MarkdownCache {
    blobs: Arc<dyn BlobStore>,
}

impl MarkdownCache {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    fn body_key(proposal_id: Uuid, key: &str) -> String {
        format!("proposals/{proposal_id}/cache/{key}.md")
    }

    fn meta_key(proposal_id: Uuid, key: &str) -> String {
        format!("proposals/{proposal_id}/cache/{key}.json")
    }

    pub async fn get(&self, proposal_id: Uuid, key: &str) -> Option<ExtractedText> {
        self.get_at(proposal_id, key, Utc::now()).await
    }

    /// Missing, corrupt and expired entries all come back as `None`.
    pub async fn get_at(
        &self,
        proposal_id: Uuid,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<ExtractedText> {
        let meta = match self.blobs.read(&Self::meta_key(proposal_id, key)).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                debug!(%proposal_id, key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(%proposal_id, key, "cache metadata unreadable: {e}");
                return None;
            }
        };
        let meta: CacheMetadata = match serde_json::from_slice(&meta) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(%proposal_id, key, "cache metadata corrupt: {e}");
                return None;
            }
        };
        if is_expired(&meta, now) {
            debug!(%proposal_id, key, "cache entry expired");
            return None;
        }
        let body = match self.blobs.read(&Self::body_key(proposal_id, key)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%proposal_id, key, "cache body unreadable: {e}");
                return None;
            }
        };
        let body = match String::from_utf8(body) {
            Ok(body) => body,
            Err(e) => {
                warn!(%proposal_id, key, "cache body is not UTF-8: {e}");
                return None;
            }
        };
        Some(ExtractedText {
            filename: meta.original_filename,
            body,
            cache_key: meta.cache_key,
        })
    }

    pub async fn put(&self, proposal_id: Uuid, text: &ExtractedText) -> bool {
        self.put_at(proposal_id, text, Utc::now()).await
    }

    /// Best effort: returns whether the entry was stored, never fails the caller.
    pub async fn put_at(
        &self,
        proposal_id: Uuid,
        text: &ExtractedText,
        created_at: DateTime<Utc>,
    ) -> bool {
        let key = &text.cache_key;
        let meta = CacheMetadata {
            cache_key: key.clone(),
            original_filename: text.filename.clone(),
            created_at,
        };
        let meta = match serde_json::to_vec_pretty(&meta) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(%proposal_id, key, "cache metadata serialization failed: {e}");
                return false;
            }
        };
        if let Err(e) = self
            .blobs
            .write(&Self::body_key(proposal_id, key), text.body.as_bytes())
            .await
        {
            warn!(%proposal_id, key, "cache body write failed: {e}");
            return false;
        }
        if let Err(e) = self.blobs.write(&Self::meta_key(proposal_id, key), &meta).await {
            warn!(%proposal_id, key, "cache metadata write failed: {e}");
            return false;
        }
        true
    }

    /// Deletes every expired or corrupt entry across all proposals.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut removed = 0;
        for meta_key in self.blobs.list("proposals/").await? {
            if !meta_key.contains("/cache/") || !meta_key.ends_with(".json") {
                continue;
            }
            let stale = match self.blobs.read(&meta_key).await {
                Ok(bytes) => serde_json::from_slice::<CacheMetadata>(&bytes)
                    .map(|meta| is_expired(&meta, now))
                    .unwrap_or(true),
                Err(StorageError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if stale {
                let body_key = format!("{}.md", meta_key.trim_end_matches(".json"));
                self.blobs.delete(&meta_key).await?;
                self.blobs.delete(&body_key).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("cache sweep removed {removed} expired entries");
        }
        Ok(removed)
    }
}

fn is_expired(meta: &CacheMetadata, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(meta.created_at) >= Duration::hours(FRESHNESS_WINDOW_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsBlobStore;
    use chrono::TimeZone;

    fn cache() -> (tempfile::TempDir, Arc<dyn BlobStore>, MarkdownCache) {
        let dir = tempfile::tempdir().unwrap();
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(dir.path()));
        let cache = MarkdownCache::new(blobs.clone());
        (dir, blobs, cache)
    }

    fn text(key: &str) -> ExtractedText {
        ExtractedText::from_raw("rfp.txt", "# RFP\n\nMust support SSO.", key)
    }

    #[test]
    fn test_cache_key_is_pure_in_filename_and_mtime() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(cache_key("rfp.pdf", Some(t)), cache_key("rfp.pdf", Some(t)));
        assert_ne!(
            cache_key("rfp.pdf", Some(t)),
            cache_key("rfp.pdf", Some(t + Duration::seconds(1)))
        );
        assert_ne!(cache_key("rfp.pdf", Some(t)), cache_key("other.pdf", Some(t)));
        assert_eq!(cache_key("rfp.pdf", Some(t)).len(), 64);
    }

    #[tokio::test]
    async fn test_get_after_put_returns_stored_text() {
        let (_dir, _blobs, cache) = cache();
        let proposal = Uuid::new_v4();
        let stored = text("k1");
        assert!(cache.put(proposal, &stored).await);
        assert_eq!(cache.get(proposal, "k1").await, Some(stored));
    }

    #[tokio::test]
    async fn test_entries_are_scoped_per_proposal() {
        let (_dir, _blobs, cache) = cache();
        cache.put(Uuid::new_v4(), &text("k1")).await;
        assert!(cache.get(Uuid::new_v4(), "k1").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_freshness_window() {
        let (_dir, _blobs, cache) = cache();
        let proposal = Uuid::new_v4();
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        cache.put_at(proposal, &text("k1"), created).await;

        let almost = created + Duration::hours(FRESHNESS_WINDOW_HOURS) - Duration::seconds(1);
        assert!(cache.get_at(proposal, "k1", almost).await.is_some());
        let expired = created + Duration::hours(FRESHNESS_WINDOW_HOURS);
        assert!(cache.get_at(proposal, "k1", expired).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_a_miss() {
        let (_dir, blobs, cache) = cache();
        let proposal = Uuid::new_v4();
        cache.put(proposal, &text("k1")).await;
        blobs
            .write(&format!("proposals/{proposal}/cache/k1.json"), b"{not json")
            .await
            .unwrap();
        assert!(cache.get(proposal, "k1").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_entries() {
        let (_dir, blobs, cache) = cache();
        let proposal = Uuid::new_v4();
        let now = Utc::now();
        cache
            .put_at(proposal, &text("old"), now - Duration::hours(30))
            .await;
        cache.put_at(proposal, &text("new"), now).await;

        assert_eq!(cache.sweep_expired(now).await.unwrap(), 1);
        let keys = blobs.list(&format!("proposals/{proposal}/cache/")).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.contains("/new.")));
    }
}
