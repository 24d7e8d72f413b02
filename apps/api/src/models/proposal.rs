use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::models::Analysis;

/// Which kind of source document an upload represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    #[default]
    Rfp,
    OrganizationProfile,
}

impl DocumentKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rfp" => Some(DocumentKind::Rfp),
            "organization_profile" | "org_profile" | "profile" => {
                Some(DocumentKind::OrganizationProfile)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub original_name: String,
    pub kind: DocumentKind,
    pub media_type: String,
    pub size: u64,
    pub cache_key: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    SourceMarkdown,
    OrganizationProfile,
    Requirements,
    ResponseTemplate,
    Variables,
    WordDocument,
}

impl ArtifactKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Variables => "application/json",
            ArtifactKind::WordDocument => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            _ => "text/markdown; charset=utf-8",
        }
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, ArtifactKind::WordDocument)
    }
}

/// One generated file attached to a proposal. `storage_key` addresses the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactRecord {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub kind: ArtifactKind,
    pub storage_key: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskKey {
    RfpAnalysis,
    OrganizationProfile,
    ResponseReview,
    DocumentGeneration,
}

impl SubtaskKey {
    /// The fixed checklist order.
    pub const ALL: [SubtaskKey; 4] = [
        SubtaskKey::RfpAnalysis,
        SubtaskKey::OrganizationProfile,
        SubtaskKey::ResponseReview,
        SubtaskKey::DocumentGeneration,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SubtaskKey::RfpAnalysis => "Upload and analyze the RFP",
            SubtaskKey::OrganizationProfile => "Upload the organization profile",
            SubtaskKey::ResponseReview => "Review and complete response variables",
            SubtaskKey::DocumentGeneration => "Generate the response document",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
    pub key: SubtaskKey,
    pub label: String,
    pub status: SubtaskStatus,
}

/// The unit a user organizes uploads around.
///
/// `version` is bumped by the record store on every successful save and is used
/// to reject stale writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub documents: Vec<DocumentRecord>,
    pub artifacts: Vec<ArtifactRecord>,
    pub analysis: Option<Analysis>,
    pub subtasks: Vec<Subtask>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(owner_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            documents: Vec::new(),
            artifacts: Vec::new(),
            analysis: None,
            subtasks: SubtaskKey::ALL
                .iter()
                .map(|key| Subtask {
                    key: *key,
                    label: key.label().to_string(),
                    status: SubtaskStatus::Pending,
                })
                .collect(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn artifact(&self, name: &str) -> Option<&ArtifactRecord> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Inserts the artifact, replacing any existing entry with the same name in place.
    /// A replaced entry keeps its original id and creation time.
    pub fn upsert_artifact(&mut self, mut artifact: ArtifactRecord) {
        match self.artifacts.iter_mut().find(|a| a.name == artifact.name) {
            Some(existing) => {
                artifact.id = existing.id;
                artifact.created_at = existing.created_at;
                *existing = artifact;
            }
            None => self.artifacts.push(artifact),
        }
    }

    /// One-way transition: a completed subtask never returns to pending.
    pub fn complete_subtask(&mut self, key: SubtaskKey) {
        if let Some(subtask) = self.subtasks.iter_mut().find(|s| s.key == key) {
            subtask.status = SubtaskStatus::Completed;
        }
    }

    pub fn subtask_status(&self, key: SubtaskKey) -> Option<SubtaskStatus> {
        self.subtasks.iter().find(|s| s.key == key).map(|s| s.status)
    }
}
