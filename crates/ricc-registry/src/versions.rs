//! The version-chain state machine (§4.3, §4.10).
//!
//! Every transition here is a conditional `UPDATE ... WHERE status = $expected`
//! — never a read-then-write — so a double-delivered worker event or a
//! concurrent orchestrator call can't race past an illegal transition.  A
//! conditional update that matches zero rows is a no-op, not an error: the
//! caller inspects the returned `bool` if it cares.

use ricc_core::{CoreError, DocumentId, FileId, Timestamp, VersionId};
use ricc_domain::{DocumentKey, DocumentVersion, VersionStatus};
use sqlx::PgPool;

use crate::rows::VersionRow;

#[derive(Debug, Clone)]
pub struct NewVersion {
    pub document_id: DocumentId,
    pub version_label: Option<String>,
    pub effective_date: Option<chrono::NaiveDate>,
    pub parent_version_id: Option<VersionId>,
    pub tenant_id: String,
    pub effective_year: i32,
    pub uploaded_by: String,
    pub raw_sha256: String,
}

pub async fn find_version_by_id(pool: &PgPool, version_id: VersionId) -> Result<Option<DocumentVersion>, CoreError> {
    let row = sqlx::query_as::<_, VersionRow>(
        "SELECT version_id, document_id, version_label, effective_date, parent_version_id, \
         tenant_id, effective_year, uploaded_by, uploaded_at, raw_sha256, file_id, status, \
         artifacts_json, created_at, updated_at \
         FROM document_versions WHERE version_id = $1",
    )
    .bind(version_id.0)
    .fetch_optional(pool)
    .await?;

    row.map(DocumentVersion::try_from).transpose()
}

/// Finds a version attached to `file_id` whose parent document matches
/// `key` exactly (§4.6 step 4's dedupe-shortcut join). Dedupe only applies
/// within the same logical document — a shared sha across unrelated
/// documents is not eligible (§4.6 "tie-breaks").
pub async fn find_dedupe_candidate(
    pool: &PgPool,
    file_id: FileId,
    key: &DocumentKey,
) -> Result<Option<DocumentVersion>, CoreError> {
    let row = sqlx::query_as::<_, VersionRow>(
        "SELECT v.version_id, v.document_id, v.version_label, v.effective_date, \
         v.parent_version_id, v.tenant_id, v.effective_year, v.uploaded_by, v.uploaded_at, \
         v.raw_sha256, v.file_id, v.status, v.artifacts_json, v.created_at, v.updated_at \
         FROM document_versions v \
         JOIN documents d ON d.document_id = v.document_id \
         WHERE v.file_id = $1 \
           AND d.title = $2 AND d.jurisdiction = $3 \
           AND d.regulation_family = $4 AND d.instrument_type = $5 \
         ORDER BY v.created_at DESC \
         LIMIT 1",
    )
    .bind(file_id.0)
    .bind(&key.title)
    .bind(&key.jurisdiction)
    .bind(&key.regulation_family)
    .bind(&key.instrument_type)
    .fetch_optional(pool)
    .await?;

    row.map(DocumentVersion::try_from).transpose()
}

/// Creates a version row in `PENDING` with `file_id = NULL` (§4.3,
/// §4.6 step 7). Validates `parent_version_id`, if supplied, exists and
/// belongs to the same document — a DAG edge checked at write time, never
/// by traversal (§9 "Cyclic references").
pub async fn create_version(pool: &PgPool, new: NewVersion) -> Result<DocumentVersion, CoreError> {
    if let Some(parent_id) = new.parent_version_id {
        let parent = find_version_by_id(pool, parent_id).await?.ok_or(CoreError::ParentVersionUnknown {
            parent_version_id: parent_id,
        })?;
        if parent.document_id != new.document_id {
            return Err(CoreError::ParentVersionWrongDocument {
                parent_version_id: parent_id,
                expected_document_id: new.document_id,
                actual_document_id: parent.document_id,
            });
        }
    }

    let version_id = VersionId::new();
    let now = Timestamp::now();

    sqlx::query(
        "INSERT INTO document_versions \
         (version_id, document_id, version_label, effective_date, parent_version_id, \
          tenant_id, effective_year, uploaded_by, uploaded_at, raw_sha256, file_id, status, \
          artifacts_json, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, $9, NULL, 'PENDING', NULL, $10, $10)",
    )
    .bind(version_id.0)
    .bind(new.document_id.0)
    .bind(&new.version_label)
    .bind(new.effective_date)
    .bind(new.parent_version_id.map(|v| v.0))
    .bind(&new.tenant_id)
    .bind(new.effective_year)
    .bind(&new.uploaded_by)
    .bind(&new.raw_sha256)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;

    Ok(DocumentVersion {
        version_id,
        document_id: new.document_id,
        version_label: new.version_label,
        effective_date: new.effective_date,
        parent_version_id: new.parent_version_id,
        tenant_id: new.tenant_id,
        effective_year: new.effective_year,
        uploaded_by: new.uploaded_by,
        uploaded_at: None,
        raw_sha256: new.raw_sha256,
        file_id: None,
        status: VersionStatus::Pending,
        artifacts_json: None,
        created_at: now,
        updated_at: now,
    })
}

/// Attaches `file_id` to a version exactly once (§3: "`file_id` is attached
/// exactly once and never mutated thereafter"). Also stamps `uploaded_at`,
/// matching §4.6 step 8's "Attach `file_id`... (sets `uploaded_at`)".
pub async fn set_version_file_id(pool: &PgPool, version_id: VersionId, file_id: FileId) -> Result<bool, CoreError> {
    let now = Timestamp::now();
    let result = sqlx::query(
        "UPDATE document_versions SET file_id = $2, uploaded_at = $3, updated_at = $3 \
         WHERE version_id = $1 AND file_id IS NULL",
    )
    .bind(version_id.0)
    .bind(file_id.0)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_artifacts_json(
    pool: &PgPool,
    version_id: VersionId,
    artifacts_json: serde_json::Value,
) -> Result<(), CoreError> {
    sqlx::query("UPDATE document_versions SET artifacts_json = $2, updated_at = $3 WHERE version_id = $1")
        .bind(version_id.0)
        .bind(artifacts_json)
        .bind(Timestamp::now().as_datetime())
        .execute(pool)
        .await?;
    Ok(())
}

/// `ACTIVE -> SUPERSEDED` only (§4.10). A version that is `PENDING` or
/// already `FAILED`/`SUPERSEDED` is left untouched; returns whether the
/// transition actually happened.
pub async fn mark_parent_superseded(pool: &PgPool, version_id: VersionId) -> Result<bool, CoreError> {
    let now = Timestamp::now();
    let result = sqlx::query(
        "UPDATE document_versions SET status = 'SUPERSEDED', updated_at = $2 \
         WHERE version_id = $1 AND status = 'ACTIVE'",
    )
    .bind(version_id.0)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// `PENDING -> ACTIVE` only (§4.10, canonicalize worker success path).
pub async fn set_status_pending_to_active(pool: &PgPool, version_id: VersionId) -> Result<bool, CoreError> {
    let now = Timestamp::now();
    let result = sqlx::query(
        "UPDATE document_versions SET status = 'ACTIVE', updated_at = $2 \
         WHERE version_id = $1 AND status = 'PENDING'",
    )
    .bind(version_id.0)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// `PENDING -> FAILED` only (§4.10, worker/orchestrator failure path).
/// Terminal: a `FAILED` version is never resurrected (§7); a retry must be
/// a new upload, which is a new version row entirely.
pub async fn set_status_pending_to_failed(pool: &PgPool, version_id: VersionId) -> Result<bool, CoreError> {
    let now = Timestamp::now();
    let result = sqlx::query(
        "UPDATE document_versions SET status = 'FAILED', updated_at = $2 \
         WHERE version_id = $1 AND status = 'PENDING'",
    )
    .bind(version_id.0)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
