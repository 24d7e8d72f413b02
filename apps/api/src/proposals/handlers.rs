use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::proposal::{ArtifactRecord, DocumentKind, Proposal};
use crate::proposals::service::{ArtifactContent, ArtifactUpdate, ProcessOutcome, UploadedFile};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct ProposalNameRequest {
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct ArtifactContentRequest {
    pub user_id: Uuid,
    pub content: String,
}

/// GET /api/v1/proposals
pub async fn handle_list_proposals(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<Proposal>>, AppError> {
    Ok(Json(state.proposals.list_proposals(params.user_id).await?))
}

/// POST /api/v1/proposals
pub async fn handle_create_proposal(
    State(state): State<AppState>,
    Json(req): Json<ProposalNameRequest>,
) -> Result<(StatusCode, Json<Proposal>), AppError> {
    let proposal = state.proposals.create_proposal(req.user_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

/// GET /api/v1/proposals/:id
pub async fn handle_get_proposal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Proposal>, AppError> {
    Ok(Json(state.proposals.get_proposal(params.user_id, id).await?))
}

/// PATCH /api/v1/proposals/:id
pub async fn handle_rename_proposal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProposalNameRequest>,
) -> Result<Json<Proposal>, AppError> {
    let proposal = state
        .proposals
        .rename_proposal(req.user_id, id, &req.name)
        .await?;
    Ok(Json(proposal))
}

/// DELETE /api/v1/proposals/:id
pub async fn handle_delete_proposal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    state.proposals.delete_proposal(params.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/proposals/:id/documents
///
/// Multipart fields: `file` (required), `kind` (`rfp` or `organization_profile`,
/// default `rfp`) and `last_modified` (epoch millis or RFC 3339).
pub async fn handle_upload_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    mut multipart: Multipart,
) -> Result<Json<ProcessOutcome>, AppError> {
    let mut kind = DocumentKind::default();
    let mut modified_at = None;
    let mut file: Option<(String, Option<String>, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let original_name = field
                    .file_name()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("Uploaded file has no name".into()))?;
                let media_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(malformed)?;
                file = Some((original_name, media_type, data));
            }
            "kind" => {
                let raw = field.text().await.map_err(malformed)?;
                kind = DocumentKind::parse(&raw).ok_or_else(|| {
                    AppError::Validation(format!("Unknown document kind '{raw}'"))
                })?;
            }
            "last_modified" => {
                let raw = field.text().await.map_err(malformed)?;
                modified_at = Some(parse_last_modified(&raw)?);
            }
            _ => {}
        }
    }

    let (original_name, media_type, data) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }

    let path = stage_upload(&state.config.uploads_dir(), &data).await?;
    info!(proposal_id = %id, filename = %original_name, size = data.len(), ?kind, "upload received");

    let upload = UploadedFile {
        path,
        original_name,
        media_type,
        modified_at,
    };
    let outcome = match kind {
        DocumentKind::Rfp => {
            state
                .proposals
                .process_document(params.user_id, id, upload)
                .await?
        }
        DocumentKind::OrganizationProfile => {
            state
                .proposals
                .attach_profile(params.user_id, id, upload)
                .await?
        }
    };
    Ok(Json(outcome))
}

/// POST /api/v1/proposals/:id/analysis/refresh
pub async fn handle_refresh_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ProcessOutcome>, AppError> {
    Ok(Json(state.proposals.refresh_analysis(params.user_id, id).await?))
}

/// POST /api/v1/proposals/:id/document
pub async fn handle_generate_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<(StatusCode, Json<ArtifactRecord>), AppError> {
    let record = state.proposals.generate_document(params.user_id, id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/proposals/:id/artifacts/:name
pub async fn handle_get_artifact(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ArtifactContent>, AppError> {
    let content = state
        .proposals
        .get_artifact_content(params.user_id, id, &name)
        .await?;
    Ok(Json(content))
}

/// PUT /api/v1/proposals/:id/artifacts/:name
pub async fn handle_update_artifact(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
    Json(req): Json<ArtifactContentRequest>,
) -> Result<Json<ArtifactUpdate>, AppError> {
    let update = state
        .proposals
        .update_artifact_content(req.user_id, id, &name, &req.content)
        .await?;
    Ok(Json(update))
}

/// GET /api/v1/proposals/:id/artifacts/:name/download
pub async fn handle_download_artifact(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
    Query(params): Query<UserIdQuery>,
) -> Result<Response, AppError> {
    let (record, bytes) = state
        .proposals
        .download_artifact(params.user_id, id, &name)
        .await?;
    let headers = [
        (header::CONTENT_TYPE, record.kind.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", record.name),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// Writes the upload under a fresh name in `dir`. A failed write leaves no file behind.
async fn stage_upload(dir: &std::path::Path, data: &[u8]) -> Result<PathBuf, AppError> {
    let path = dir.join(format!("{}.upload", Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&path, data).await {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(AppError::Internal(anyhow::anyhow!(
            "failed to stage upload {}: {e}",
            path.display()
        )));
    }
    Ok(path)
}

fn malformed(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Malformed upload: {e}"))
}

/// Accepts epoch milliseconds (as browsers report `File.lastModified`) or RFC 3339.
fn parse_last_modified(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    let parsed = match raw.parse::<i64>() {
        Ok(millis) => Utc.timestamp_millis_opt(millis).single(),
        Err(_) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
    };
    parsed.ok_or_else(|| AppError::Validation(format!("Invalid last_modified value '{raw}'")))
}
