//! Audit trail lookup routes (§4.5, §6): a version's hash chain, and the
//! operator sweep that recomputes every chain and reports broken links.
//!
//! "Operator-only" on `GET audit/verify` is enforced by the same
//! authenticated/unauthenticated boundary every other route sits behind —
//! this surface has no separate operator role, so any caller who can
//! authenticate can run the sweep.

use axum::extract::{Path, State};
use axum::Json;
use ricc_core::{CoreError, VersionId};
use ricc_domain::{AuditEvent, EntityType};
use serde::Serialize;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

pub async fn get_version_audit(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(version_id): Path<VersionId>,
) -> Result<Json<Vec<AuditEvent>>, AppError> {
    ricc_registry::find_version_by_id(&state.pool, version_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { what: format!("version {version_id}") })?;

    let history = state.audit.history_for_entity(EntityType::Version, &version_id.to_string()).await?;
    Ok(Json(history))
}

#[derive(Debug, Serialize)]
pub struct VerifyAuditResponse {
    pub broken_links: usize,
}

pub async fn verify_audit(
    State(state): State<AppState>,
    _caller: CallerIdentity,
) -> Result<Json<VerifyAuditResponse>, AppError> {
    let broken_links = state.audit.verify_chain_integrity().await?;
    Ok(Json(VerifyAuditResponse { broken_links }))
}
