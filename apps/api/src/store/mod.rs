//! Proposal record store.
//!
//! One record per proposal, never a whole-collection rewrite. `save` takes the
//! version the caller read and fails with [`StoreError::Conflict`] if someone
//! else saved in between; on success the stored version is incremented.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::proposal::Proposal;

pub mod fs;
pub mod pg;

pub use fs::FsProposalStore;
pub use pg::PgProposalStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("proposal {0} not found")]
    NotFound(Uuid),

    #[error("proposal {id} was modified concurrently (expected version {expected})")]
    Conflict { id: Uuid, expected: i64 },

    #[error("record I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// All proposals of one owner, oldest first.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Proposal>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Proposal>, StoreError>;

    /// Stores a new proposal and returns it at version 1.
    async fn insert(&self, proposal: Proposal) -> Result<Proposal, StoreError>;

    /// Writes `proposal` if the stored version still equals `proposal.version`.
    /// Returns the record as stored, with the bumped version.
    async fn save(&self, proposal: Proposal) -> Result<Proposal, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}
