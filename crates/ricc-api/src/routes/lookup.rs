//! Read-only lookup routes (§6): documents, versions, evidence files, and
//! derived artifacts by id. Every domain entity here already derives
//! `Serialize`, so these handlers are thin: fetch, 404 if absent, return
//! JSON as-is.

use axum::extract::{Path, State};
use axum::Json;
use ricc_core::{ArtifactId, CoreError, DocumentId, FileId, VersionId};
use ricc_domain::{Document, DocumentVersion, DerivedArtifact};
use serde::Serialize;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

pub async fn get_document(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(document_id): Path<DocumentId>,
) -> Result<Json<Document>, AppError> {
    let doc = ricc_registry::find_document_by_id(&state.pool, document_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { what: format!("document {document_id}") })?;
    Ok(Json(doc))
}

pub async fn get_version(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(version_id): Path<VersionId>,
) -> Result<Json<DocumentVersion>, AppError> {
    let version = ricc_registry::find_version_by_id(&state.pool, version_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { what: format!("version {version_id}") })?;
    Ok(Json(version))
}

#[derive(Debug, Serialize)]
pub struct FileView {
    pub file_id: FileId,
    pub version_id: VersionId,
    pub sha256: String,
    pub mime_type: String,
    pub size_bytes: i64,
    /// A `file://` path for the local backend, or a time-limited presigned
    /// URL for an `s3://`-addressed object (§6).
    pub url: String,
}

pub async fn get_file(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(file_id): Path<FileId>,
) -> Result<Json<FileView>, AppError> {
    let file = state
        .evidence
        .find_by_id(file_id)
        .await?
        .ok_or_else(|| CoreError::EvidenceNotFound { file_id })?;

    let url = state.store.signed_url(&file.storage_uri, state.config.signed_url_expires_sec).await?;

    Ok(Json(FileView {
        file_id: file.file_id,
        version_id: file.version_id,
        sha256: file.sha256,
        mime_type: file.mime_type,
        size_bytes: file.size_bytes,
        url,
    }))
}

pub async fn get_artifact(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(artifact_id): Path<ArtifactId>,
) -> Result<Json<DerivedArtifact>, AppError> {
    let artifact = state
        .artifacts
        .find_by_id(artifact_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { what: format!("artifact {artifact_id}") })?;
    Ok(Json(artifact))
}
