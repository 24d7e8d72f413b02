use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{ProposalStore, StoreError};
use crate::models::proposal::Proposal;

/// PostgreSQL-backed store: one row per proposal, body as JSONB.
///
/// `save` is a conditional UPDATE on `version`, so stale writers are rejected
/// across processes as well.
#[derive(Clone)]
pub struct PgProposalStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct ProposalRow {
    version: i64,
    body: Value,
}

impl ProposalRow {
    fn into_proposal(self) -> Result<Proposal, StoreError> {
        let mut proposal: Proposal = serde_json::from_value(self.body)?;
        proposal.version = self.version;
        Ok(proposal)
    }
}

impl PgProposalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS proposals (
                id          UUID PRIMARY KEY,
                owner_id    UUID NOT NULL,
                version     BIGINT NOT NULL,
                body        JSONB NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS proposals_owner_idx ON proposals (owner_id)")
            .execute(&self.pool)
            .await?;
        info!("proposals table ready");
        Ok(())
    }
}

#[async_trait]
impl ProposalStore for PgProposalStore {
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Proposal>, StoreError> {
        let rows = sqlx::query_as::<_, ProposalRow>(
            "SELECT version, body FROM proposals WHERE owner_id = $1 ORDER BY created_at, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ProposalRow::into_proposal).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Proposal>, StoreError> {
        let row = sqlx::query_as::<_, ProposalRow>(
            "SELECT version, body FROM proposals WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProposalRow::into_proposal).transpose()
    }

    async fn insert(&self, mut proposal: Proposal) -> Result<Proposal, StoreError> {
        proposal.version = 1;
        sqlx::query(
            r#"
            INSERT INTO proposals (id, owner_id, version, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(proposal.id)
        .bind(proposal.owner_id)
        .bind(proposal.version)
        .bind(serde_json::to_value(&proposal)?)
        .bind(proposal.created_at)
        .bind(proposal.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(proposal)
    }

    async fn save(&self, mut proposal: Proposal) -> Result<Proposal, StoreError> {
        let expected = proposal.version;
        proposal.version += 1;
        proposal.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE proposals
            SET version = $1, body = $2, updated_at = $3
            WHERE id = $4 AND version = $5
            "#,
        )
        .bind(proposal.version)
        .bind(serde_json::to_value(&proposal)?)
        .bind(proposal.updated_at)
        .bind(proposal.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT version FROM proposals WHERE id = $1")
                    .bind(proposal.id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict {
                    id: proposal.id,
                    expected,
                },
                None => StoreError::NotFound(proposal.id),
            });
        }
        Ok(proposal)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM proposals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
