//! Proposal orchestration.
//!
//! Every mutating operation takes the proposal's lock, reads the record,
//! writes any blobs, then commits the record with a single versioned save.
//! Each operation writes its blobs under a fresh run id and never touches the
//! keys the stored record points at. The blobs a record stops referencing are
//! removed only after the save succeeds. When a write or the save fails, the
//! run's own blobs are removed and the stored proposal keeps reading the
//! files it had.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{Analysis, AnalysisEngine};
use crate::artifacts::{
    self, assemble, docx::markdown_to_docx, render::render, ORGANIZATION_PROFILE,
    RESPONSE_TEMPLATE, SOURCE_MARKDOWN, VARIABLES, WORD_DOCUMENT,
};
use crate::cache::{cache_key, MarkdownCache};
use crate::errors::AppError;
use crate::extraction::{placeholder_body, resolve_media_type, ExtractedText, ExtractorRegistry};
use crate::models::proposal::{
    ArtifactKind, ArtifactRecord, DocumentKind, DocumentRecord, Proposal, SubtaskKey,
};
use crate::proposals::locks::KeyedLocks;
use crate::storage::{artifact_key, proposal_prefix, BlobStore};
use crate::store::ProposalStore;

pub const DEFAULT_PROPOSAL_NAME: &str = "My First Proposal";
const MAX_NAME_CHARS: usize = 200;

/// A raw upload already written to local disk by the transport layer.
/// The service owns it from here on and deletes it when done.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub original_name: String,
    pub media_type: Option<String>,
    /// Client-reported modification time. Falls back to the file's own mtime.
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ProcessOutcome {
    pub proposal: Proposal,
    pub analysis: Option<Analysis>,
    pub artifacts: Vec<ArtifactRecord>,
    pub cache_hit: bool,
}

#[derive(Debug, Serialize)]
pub struct ArtifactContent {
    pub name: String,
    pub content: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactUpdate {
    pub size: u64,
    pub updated_at: DateTime<Utc>,
}

/// Blobs written by one operation, and the ones its save will make unreachable.
struct Staged {
    run_id: Uuid,
    written: Vec<String>,
    superseded: Vec<String>,
}

impl Staged {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            written: Vec::new(),
            superseded: Vec::new(),
        }
    }
}

/// Extracted text for one upload plus what we learned about the file.
struct Extracted {
    text: ExtractedText,
    size: u64,
    media_type: String,
    cache_hit: bool,
}

#[derive(Clone)]
pub struct ProposalService {
    store: Arc<dyn ProposalStore>,
    blobs: Arc<dyn BlobStore>,
    cache: MarkdownCache,
    extractors: Arc<ExtractorRegistry>,
    engine: AnalysisEngine,
    locks: KeyedLocks,
}

impl ProposalService {
    pub fn new(
        store: Arc<dyn ProposalStore>,
        blobs: Arc<dyn BlobStore>,
        extractors: ExtractorRegistry,
        engine: AnalysisEngine,
    ) -> Self {
        Self {
            cache: MarkdownCache::new(blobs.clone()),
            store,
            blobs,
            extractors: Arc::new(extractors),
            engine,
            locks: KeyedLocks::default(),
        }
    }

    pub fn cache(&self) -> &MarkdownCache {
        &self.cache
    }

    // ── Proposal CRUD ─────────────────────────────────────────────────────────

    /// Lists the owner's proposals, creating a default one for a new owner.
    pub async fn list_proposals(&self, owner_id: Uuid) -> Result<Vec<Proposal>, AppError> {
        let _guard = self.locks.acquire(owner_id).await;
        let proposals = self.store.list_for_owner(owner_id).await?;
        if !proposals.is_empty() {
            return Ok(proposals);
        }
        let seeded = self
            .store
            .insert(Proposal::new(owner_id, DEFAULT_PROPOSAL_NAME))
            .await?;
        info!(%owner_id, proposal_id = %seeded.id, "seeded default proposal");
        Ok(vec![seeded])
    }

    pub async fn create_proposal(&self, owner_id: Uuid, name: &str) -> Result<Proposal, AppError> {
        let name = validate_name(name)?;
        let proposal = self.store.insert(Proposal::new(owner_id, name)).await?;
        info!(%owner_id, proposal_id = %proposal.id, "proposal created");
        Ok(proposal)
    }

    pub async fn get_proposal(&self, owner_id: Uuid, id: Uuid) -> Result<Proposal, AppError> {
        self.load_owned(owner_id, id).await
    }

    pub async fn rename_proposal(
        &self,
        owner_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<Proposal, AppError> {
        let name = validate_name(name)?;
        let _guard = self.locks.acquire(id).await;
        let mut proposal = self.load_owned(owner_id, id).await?;
        proposal.name = name;
        Ok(self.store.save(proposal).await?)
    }

    /// Deletes a proposal and everything stored under it. An owner always
    /// keeps at least one proposal.
    pub async fn delete_proposal(&self, owner_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let _owner_guard = self.locks.acquire(owner_id).await;
        let proposals = self.store.list_for_owner(owner_id).await?;
        if !proposals.iter().any(|p| p.id == id) {
            return Err(not_found(id));
        }
        if proposals.len() <= 1 {
            return Err(AppError::LastProposal);
        }

        let _guard = self.locks.acquire(id).await;
        self.store.delete(id).await?;
        if let Err(e) = self.blobs.delete_prefix(&proposal_prefix(id)).await {
            warn!(proposal_id = %id, "proposal deleted but its files were not: {e}");
        }
        info!(%owner_id, proposal_id = %id, "proposal deleted");
        Ok(())
    }

    // ── Documents ─────────────────────────────────────────────────────────────

    /// Runs an RFP through extraction, analysis and artifact generation.
    /// The raw upload is deleted whatever the outcome.
    pub async fn process_document(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
        upload: UploadedFile,
    ) -> Result<ProcessOutcome, AppError> {
        let result = self.process_rfp(owner_id, proposal_id, &upload).await;
        discard_upload(&upload).await;
        result
    }

    /// Stores an organization profile document as markdown. No analysis.
    pub async fn attach_profile(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
        upload: UploadedFile,
    ) -> Result<ProcessOutcome, AppError> {
        let result = self.store_profile(owner_id, proposal_id, &upload).await;
        discard_upload(&upload).await;
        result
    }

    async fn process_rfp(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
        upload: &UploadedFile,
    ) -> Result<ProcessOutcome, AppError> {
        let _guard = self.locks.acquire(proposal_id).await;
        let mut proposal = self.load_owned(owner_id, proposal_id).await?;

        let extracted = self.extract(proposal_id, upload).await?;
        let analysis = self
            .engine
            .analyze(&extracted.text.body, &upload.original_name, &proposal.name)
            .await?;

        let files = assemble(&analysis)?.files()?;

        let mut staged = Staged::new();
        let mut written = vec![
            self.write_artifact(
                &mut proposal,
                &mut staged,
                SOURCE_MARKDOWN,
                extracted.text.body.as_bytes(),
            )
            .await?,
        ];
        for (name, bytes) in files {
            written.push(self.write_artifact(&mut proposal, &mut staged, name, &bytes).await?);
        }

        proposal.documents.push(document_record(
            upload,
            DocumentKind::Rfp,
            &extracted,
        ));
        proposal.analysis = Some(analysis.clone());
        proposal.complete_subtask(SubtaskKey::RfpAnalysis);

        let proposal = self.commit(proposal, staged).await?;
        info!(
            %proposal_id,
            filename = %upload.original_name,
            cache_hit = extracted.cache_hit,
            requirements = analysis.requirements.total(),
            "RFP processed"
        );
        Ok(ProcessOutcome {
            proposal,
            analysis: Some(analysis),
            artifacts: written,
            cache_hit: extracted.cache_hit,
        })
    }

    async fn store_profile(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
        upload: &UploadedFile,
    ) -> Result<ProcessOutcome, AppError> {
        let _guard = self.locks.acquire(proposal_id).await;
        let mut proposal = self.load_owned(owner_id, proposal_id).await?;

        let extracted = self.extract(proposal_id, upload).await?;
        let mut staged = Staged::new();
        let artifact = self
            .write_artifact(
                &mut proposal,
                &mut staged,
                ORGANIZATION_PROFILE,
                extracted.text.body.as_bytes(),
            )
            .await?;
        proposal.documents.push(document_record(
            upload,
            DocumentKind::OrganizationProfile,
            &extracted,
        ));
        proposal.complete_subtask(SubtaskKey::OrganizationProfile);

        let proposal = self.commit(proposal, staged).await?;
        info!(%proposal_id, filename = %upload.original_name, "organization profile attached");
        Ok(ProcessOutcome {
            proposal,
            analysis: None,
            artifacts: vec![artifact],
            cache_hit: extracted.cache_hit,
        })
    }

    /// Re-analyzes the stored source markdown without a new upload.
    pub async fn refresh_analysis(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<ProcessOutcome, AppError> {
        let _guard = self.locks.acquire(proposal_id).await;
        let mut proposal = self.load_owned(owner_id, proposal_id).await?;

        let source = self
            .read_text_artifact(&proposal, SOURCE_MARKDOWN)
            .await?
            .ok_or_else(|| AppError::Validation("Upload an RFP before refreshing its analysis".into()))?;
        let filename = proposal
            .analysis
            .as_ref()
            .map(|a| a.metadata.source_file.clone())
            .or_else(|| {
                proposal
                    .documents
                    .iter()
                    .rev()
                    .find(|d| d.kind == DocumentKind::Rfp)
                    .map(|d| d.original_name.clone())
            })
            .unwrap_or_else(|| SOURCE_MARKDOWN.to_string());

        let analysis = self.engine.analyze(&source, &filename, &proposal.name).await?;
        let files = assemble(&analysis)?.files()?;

        let mut staged = Staged::new();
        let mut written = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            written.push(self.write_artifact(&mut proposal, &mut staged, name, &bytes).await?);
        }
        proposal.analysis = Some(analysis.clone());
        proposal.complete_subtask(SubtaskKey::RfpAnalysis);

        let proposal = self.commit(proposal, staged).await?;
        info!(%proposal_id, "analysis refreshed");
        Ok(ProcessOutcome {
            proposal,
            analysis: Some(analysis),
            artifacts: written,
            cache_hit: false,
        })
    }

    /// Cache lookup first, then extraction on the blocking pool. Extraction
    /// never fails: unreadable documents come back as a placeholder body.
    async fn extract(&self, proposal_id: Uuid, upload: &UploadedFile) -> Result<Extracted, AppError> {
        let meta = fs::metadata(&upload.path)
            .await
            .map_err(|e| AppError::Internal(anyhow!("upload {} unreadable: {e}", upload.path.display())))?;
        let modified_at = upload
            .modified_at
            .or_else(|| meta.modified().ok().map(DateTime::<Utc>::from));
        let key = cache_key(&upload.original_name, modified_at);
        let media_type = resolve_media_type(upload.media_type.as_deref(), &upload.original_name);

        if let Some(text) = self.cache.get(proposal_id, &key).await {
            debug!(%proposal_id, filename = %upload.original_name, "using cached extraction");
            return Ok(Extracted {
                text,
                size: meta.len(),
                media_type,
                cache_hit: true,
            });
        }

        let data = fs::read(&upload.path)
            .await
            .map_err(|e| AppError::Internal(anyhow!("upload {} unreadable: {e}", upload.path.display())))?;
        let size = data.len();
        let extractors = self.extractors.clone();
        let filename = upload.original_name.clone();
        let declared = media_type.clone();
        let raw = tokio::task::spawn_blocking(move || extractors.extract(&data, &filename, &declared))
            .await
            .unwrap_or_else(|e| {
                warn!(filename = %upload.original_name, "extraction task failed: {e}");
                placeholder_body(&upload.original_name, size, "the document parser crashed")
            });

        let text = ExtractedText::from_raw(&upload.original_name, &raw, key);
        self.cache.put(proposal_id, &text).await;
        Ok(Extracted {
            text,
            size: size as u64,
            media_type,
            cache_hit: false,
        })
    }

    // ── Artifacts ─────────────────────────────────────────────────────────────

    pub async fn get_artifact_content(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
        name: &str,
    ) -> Result<ArtifactContent, AppError> {
        let proposal = self.load_owned(owner_id, proposal_id).await?;
        let record = text_artifact(&proposal, name)?;
        let meta = self.blobs.stat(&record.storage_key).await?;
        let bytes = self.blobs.read(&record.storage_key).await?;
        let content = String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(anyhow!("artifact {name} is not UTF-8: {e}")))?;
        Ok(ArtifactContent {
            name: record.name.clone(),
            size: meta.size,
            content,
            modified_at: meta.modified_at.unwrap_or(record.updated_at),
        })
    }

    /// Replaces a text artifact's content. Editing the template or the
    /// variables counts as reviewing the response.
    pub async fn update_artifact_content(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
        name: &str,
        content: &str,
    ) -> Result<ArtifactUpdate, AppError> {
        let _guard = self.locks.acquire(proposal_id).await;
        let mut proposal = self.load_owned(owner_id, proposal_id).await?;
        let kind = text_artifact(&proposal, name)?.kind;
        if kind == ArtifactKind::Variables {
            serde_json::from_str::<Value>(content).map_err(|e| {
                AppError::Validation(format!("{VARIABLES} must be valid JSON: {e}"))
            })?;
        }

        let mut staged = Staged::new();
        let record = self
            .write_artifact(&mut proposal, &mut staged, name, content.as_bytes())
            .await?;
        if matches!(kind, ArtifactKind::Variables | ArtifactKind::ResponseTemplate) {
            proposal.complete_subtask(SubtaskKey::ResponseReview);
        }
        self.commit(proposal, staged).await?;
        debug!(%proposal_id, name, size = record.size, "artifact updated");
        Ok(ArtifactUpdate {
            size: record.size,
            updated_at: record.updated_at,
        })
    }

    pub async fn download_artifact(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
        name: &str,
    ) -> Result<(ArtifactRecord, Vec<u8>), AppError> {
        let proposal = self.load_owned(owner_id, proposal_id).await?;
        let record = proposal
            .artifact(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Artifact {name} not found")))?;
        let bytes = self.blobs.read(&record.storage_key).await?;
        Ok((record, bytes))
    }

    /// Fills the response template with the variables and writes the result
    /// as a Word document.
    pub async fn generate_document(
        &self,
        owner_id: Uuid,
        proposal_id: Uuid,
    ) -> Result<ArtifactRecord, AppError> {
        let _guard = self.locks.acquire(proposal_id).await;
        let mut proposal = self.load_owned(owner_id, proposal_id).await?;

        let missing = || AppError::Validation("Analyze an RFP before generating a document".into());
        let template = self
            .read_text_artifact(&proposal, RESPONSE_TEMPLATE)
            .await?
            .ok_or_else(missing)?;
        let variables = self
            .read_text_artifact(&proposal, VARIABLES)
            .await?
            .ok_or_else(missing)?;
        let variables: Value = serde_json::from_str(&variables)
            .map_err(|e| AppError::Validation(format!("{VARIABLES} must be valid JSON: {e}")))?;

        let markdown = render(&template, &variables)
            .map_err(|e| AppError::Validation(format!("{RESPONSE_TEMPLATE}: {e}")))?;
        let bytes = markdown_to_docx(&markdown).map_err(|e| AppError::Internal(e.into()))?;

        let mut staged = Staged::new();
        let record = self
            .write_artifact(&mut proposal, &mut staged, WORD_DOCUMENT, &bytes)
            .await?;
        proposal.complete_subtask(SubtaskKey::DocumentGeneration);
        self.commit(proposal, staged).await?;
        info!(%proposal_id, size = record.size, "response document generated");
        Ok(record)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    async fn load_owned(&self, owner_id: Uuid, id: Uuid) -> Result<Proposal, AppError> {
        match self.store.get(id).await? {
            Some(proposal) if proposal.owner_id == owner_id => Ok(proposal),
            _ => Err(not_found(id)),
        }
    }

    /// Writes the blob under the run's key and upserts its record on the
    /// in-memory proposal. On failure every blob of the run is removed.
    async fn write_artifact(
        &self,
        proposal: &mut Proposal,
        staged: &mut Staged,
        name: &str,
        bytes: &[u8],
    ) -> Result<ArtifactRecord, AppError> {
        let Some((display_name, kind)) = artifacts::describe(name) else {
            self.discard(staged).await;
            return Err(AppError::Internal(anyhow!("unknown artifact {name}")));
        };
        let storage_key = artifact_key(proposal.id, staged.run_id, name);
        staged.written.push(storage_key.clone());
        if let Err(e) = self.blobs.write(&storage_key, bytes).await {
            self.discard(staged).await;
            return Err(e.into());
        }
        if let Some(previous) = proposal.artifact(name) {
            if previous.storage_key != storage_key {
                staged.superseded.push(previous.storage_key.clone());
            }
        }

        let now = Utc::now();
        proposal.upsert_artifact(ArtifactRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            kind,
            storage_key,
            size: bytes.len() as u64,
            created_at: now,
            updated_at: now,
        });
        proposal
            .artifact(name)
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow!("artifact {name} vanished after upsert")))
    }

    /// Saves the record. Success removes the blobs it no longer points at,
    /// failure removes the blobs this run wrote.
    async fn commit(&self, proposal: Proposal, staged: Staged) -> Result<Proposal, AppError> {
        let proposal_id = proposal.id;
        match self.store.save(proposal).await {
            Ok(saved) => {
                self.remove_blobs(&staged.superseded).await;
                Ok(saved)
            }
            Err(e) => {
                warn!(%proposal_id, run_id = %staged.run_id, "save failed, dropping run blobs: {e}");
                self.remove_blobs(&staged.written).await;
                Err(e.into())
            }
        }
    }

    async fn discard(&self, staged: &mut Staged) {
        let written = std::mem::take(&mut staged.written);
        debug!(run_id = %staged.run_id, blobs = written.len(), "discarding partial run");
        self.remove_blobs(&written).await;
    }

    async fn remove_blobs(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.blobs.delete(key).await {
                warn!(key = %key, "failed to remove blob: {e}");
            }
        }
    }

    async fn read_text_artifact(
        &self,
        proposal: &Proposal,
        name: &str,
    ) -> Result<Option<String>, AppError> {
        let Some(record) = proposal.artifact(name) else {
            return Ok(None);
        };
        let bytes = self.blobs.read(&record.storage_key).await?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| AppError::Internal(anyhow!("artifact {name} is not UTF-8: {e}")))
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Proposal {id} not found"))
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Proposal name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Proposal name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn text_artifact<'a>(proposal: &'a Proposal, name: &str) -> Result<&'a ArtifactRecord, AppError> {
    let record = proposal
        .artifact(name)
        .ok_or_else(|| AppError::NotFound(format!("Artifact {name} not found")))?;
    if !record.kind.is_text() {
        return Err(AppError::Validation(format!(
            "Artifact {name} is binary; use the download endpoint"
        )));
    }
    Ok(record)
}

fn document_record(upload: &UploadedFile, kind: DocumentKind, extracted: &Extracted) -> DocumentRecord {
    DocumentRecord {
        id: Uuid::new_v4(),
        original_name: upload.original_name.clone(),
        kind,
        media_type: extracted.media_type.clone(),
        size: extracted.size,
        cache_key: extracted.text.cache_key.clone(),
        uploaded_at: Utc::now(),
    }
}

async fn discard_upload(upload: &UploadedFile) {
    match fs::remove_file(&upload.path).await {
        Ok(()) => debug!(path = %upload.path.display(), "raw upload removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %upload.path.display(), "failed to remove raw upload: {e}"),
    }
}
