//! `POST /v1/ingest` — the multipart upload endpoint (§6).
//!
//! Parses the multipart fields into an [`ricc_ingest::IngestRequest`] and
//! hands off to [`ricc_ingest::IngestOrchestrator::ingest`]; this module's
//! only job is the HTTP-shaped parsing and response assembly around that
//! single call (§1: "HTTP surface... treated as external collaborators" to
//! the core logic, even though it's built here as ambient stack).

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use ricc_core::{CoreError, VersionId};
use ricc_domain::PrimaryAxisSource;
use serde::Serialize;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    title: Option<String>,
    jurisdiction: Option<String>,
    regulation_family: Option<String>,
    instrument_type: Option<String>,
    primary_axis: Option<String>,
    tenant_id: Option<String>,
    effective_year: Option<i32>,
    effective_date: Option<chrono::NaiveDate>,
    version_label: Option<String>,
    parent_version_id: Option<VersionId>,
    force_new_version: bool,
}

fn truthy(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

async fn parse_multipart(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::new(CoreError::ValidationMissingFields { fields: vec![e.to_string()] }))?;
        let Some(field) = field else { break };
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::new(CoreError::ValidationMissingFields { fields: vec![e.to_string()] }))?;
                form.file = Some(bytes.to_vec());
            }
            other => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::new(CoreError::ValidationMissingFields { fields: vec![e.to_string()] }))?;
                match other {
                    "title" => form.title = Some(text),
                    "jurisdiction" => form.jurisdiction = Some(text),
                    "regulation_family" => form.regulation_family = Some(text),
                    "instrument_type" => form.instrument_type = Some(text),
                    "primary_axis" => form.primary_axis = Some(text),
                    "tenant_id" => form.tenant_id = Some(text),
                    "effective_year" => form.effective_year = text.trim().parse().ok(),
                    "effective_date" => form.effective_date = text.trim().parse().ok(),
                    "version_label" => form.version_label = Some(text),
                    "parent_version_id" => {
                        form.parent_version_id = text.trim().parse().ok();
                    }
                    "force_new_version" => form.force_new_version = truthy(&text),
                    _ => {}
                }
            }
        }
    }
    Ok(form)
}

#[derive(Debug, Serialize, Default)]
pub struct ArtifactIds {
    pub stable_text_id: Option<String>,
    pub page_map_id: Option<String>,
    pub layout_map_id: Option<String>,
    pub chunk_set_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PrimaryAxisSuggestionView {
    pub suggested_axis: String,
    pub model_name: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub document_id: String,
    pub version_id: String,
    pub file_id: String,
    pub fingerprint_sha256: String,
    pub ingestion_status: String,
    pub artifacts: ArtifactIds,
    pub correlation_id: String,
    pub primary_axis_source: PrimaryAxisSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_axis_suggestion: Option<PrimaryAxisSuggestionView>,
}

/// `artifacts_json` is a compact map of artifact ids (§3's `DocumentVersion`
/// invariant); handlers never assume it's populated since canonicalization
/// runs asynchronously (§1 Non-goals: "running text extraction synchronously
/// on the upload request path").
fn artifact_ids_from_json(value: Option<&serde_json::Value>) -> ArtifactIds {
    let get = |key: &str| value.and_then(|v| v.get(key)).and_then(|v| v.as_str()).map(str::to_string);
    ArtifactIds {
        stable_text_id: get("stable_text_id"),
        page_map_id: get("page_map_id"),
        layout_map_id: get("layout_map_id"),
        chunk_set_id: get("chunk_set_id"),
    }
}

pub async fn ingest(
    State(state): State<AppState>,
    caller: CallerIdentity,
    multipart: Multipart,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let form = parse_multipart(multipart).await?;
    let bytes = form.file.ok_or_else(|| {
        AppError::new(CoreError::ValidationMissingFields { fields: vec!["file".to_string()] })
    })?;

    let req = ricc_ingest::IngestRequest {
        bytes: &bytes,
        title: form.title.as_deref(),
        jurisdiction: form.jurisdiction.as_deref(),
        regulation_family: form.regulation_family.as_deref(),
        instrument_type: form.instrument_type.as_deref(),
        tenant_id: form.tenant_id.as_deref(),
        effective_year: form.effective_year,
        primary_axis: form.primary_axis.as_deref(),
        version_label: form.version_label.as_deref(),
        effective_date: form.effective_date,
        parent_version_id: form.parent_version_id,
        actor: &caller.subject,
        force_new_version: form.force_new_version,
    };

    let outcome = state.orchestrator.ingest(req).await.map_err(AppError::new)?;

    let version = ricc_registry::find_version_by_id(&state.pool, outcome.version_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { what: format!("version {}", outcome.version_id) })?;
    let suggestion = ricc_registry::find_suggestion_by_version(&state.pool, outcome.version_id).await?;

    let ingestion_status = serde_json::to_value(outcome.ingestion_status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    let response = IngestResponse {
        document_id: outcome.document_id.to_string(),
        version_id: outcome.version_id.to_string(),
        file_id: outcome.file_id.to_string(),
        fingerprint_sha256: outcome.sha256,
        ingestion_status,
        artifacts: artifact_ids_from_json(version.artifacts_json.as_ref()),
        correlation_id: outcome.correlation_id.to_string(),
        primary_axis_source: outcome.primary_axis_source,
        primary_axis_suggestion: suggestion.map(|s| PrimaryAxisSuggestionView {
            suggested_axis: s.suggested_axis.as_str().to_string(),
            model_name: s.model_name,
            confidence: s.confidence,
        }),
    };

    Ok((StatusCode::from_u16(outcome.http_status).unwrap_or(StatusCode::OK), Json(response)))
}
