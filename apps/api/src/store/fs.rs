use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ProposalStore, StoreError};
use crate::models::proposal::Proposal;

/// One JSON file per proposal under `{base}/{id}.json`.
///
/// Writes go to a temporary file and are renamed into place. The internal
/// mutex only covers the version check plus write, which keeps `save` atomic
/// within one process.
pub struct FsProposalStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FsProposalStore {
    pub async fn open(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.base_path.join(format!("{id}.json"))
    }

    async fn read(&self, id: Uuid) -> Result<Option<Proposal>, StoreError> {
        match fs::read(self.path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let path = self.path(proposal.id);
        let tmp = self
            .base_path
            .join(format!(".{}.{}.tmp", proposal.id, Uuid::new_v4().simple()));
        fs::write(&tmp, serde_json::to_vec_pretty(proposal)?).await?;
        fs::rename(&tmp, &path).await?;
        debug!(proposal_id = %proposal.id, version = proposal.version, "proposal record written");
        Ok(())
    }
}

#[async_trait]
impl ProposalStore for FsProposalStore {
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Proposal>, StoreError> {
        let mut proposals = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|stem| Uuid::parse_str(stem).ok())
            else {
                continue;
            };
            match self.read(id).await {
                Ok(Some(p)) if p.owner_id == owner_id => proposals.push(p),
                Ok(_) => {}
                Err(StoreError::Serde(e)) => {
                    warn!(proposal_id = %id, "skipping corrupt record: {e}")
                }
                Err(e) => return Err(e),
            }
        }
        proposals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(proposals)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Proposal>, StoreError> {
        self.read(id).await
    }

    async fn insert(&self, mut proposal: Proposal) -> Result<Proposal, StoreError> {
        let _guard = self.write_lock.lock().await;
        proposal.version = 1;
        self.write(&proposal).await?;
        Ok(proposal)
    }

    async fn save(&self, mut proposal: Proposal) -> Result<Proposal, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self
            .read(proposal.id)
            .await?
            .ok_or(StoreError::NotFound(proposal.id))?;
        if current.version != proposal.version {
            return Err(StoreError::Conflict {
                id: proposal.id,
                expected: proposal.version,
            });
        }
        proposal.version += 1;
        proposal.updated_at = Utc::now();
        self.write(&proposal).await?;
        Ok(proposal)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}
