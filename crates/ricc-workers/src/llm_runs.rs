//! Owns `llm_runs` rows (§4.8, §4.11's LlmRun model). No Lookup API in §6
//! exposes this table, so unlike the registry/evidence/artifacts/audit
//! tables it has no dedicated `ricc-*` crate — the LLM worker is its only
//! writer and reader.

use ricc_core::{ArtifactId, CoreError, LlmRunId, Timestamp, VersionId};
use ricc_domain::{LlmRun, LlmRunStatus, ParseEnumError};
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct LlmRunRow {
    run_id: uuid::Uuid,
    version_id: uuid::Uuid,
    purpose: String,
    prompt_hash: String,
    input_fingerprint: String,
    status: String,
    output_artifact_id: Option<uuid::Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<LlmRunRow> for LlmRun {
    type Error = CoreError;

    fn try_from(row: LlmRunRow) -> Result<Self, Self::Error> {
        let status: LlmRunStatus = row.status.parse().map_err(|ParseEnumError(value)| {
            CoreError::Db(sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: format!("unrecognized value {value:?}").into(),
            })
        })?;
        Ok(LlmRun {
            run_id: LlmRunId(row.run_id),
            version_id: VersionId(row.version_id),
            purpose: row.purpose,
            prompt_hash: row.prompt_hash,
            input_fingerprint: row.input_fingerprint,
            status,
            output_artifact_id: row.output_artifact_id.map(ArtifactId),
            created_at: Timestamp::from_utc(row.created_at),
            completed_at: row.completed_at.map(Timestamp::from_utc),
        })
    }
}

/// Inserts a fresh `llm_runs` row in `PENDING` (§4.8: "inserts an `llm_run`
/// row" before invoking the pluggable LLM).
pub async fn create_pending(
    pool: &PgPool,
    version_id: VersionId,
    purpose: &str,
    prompt_hash: &str,
    input_fingerprint: &str,
) -> Result<LlmRun, CoreError> {
    let run_id = LlmRunId::new();
    let now = Timestamp::now();
    sqlx::query(
        "INSERT INTO llm_runs \
         (run_id, version_id, purpose, prompt_hash, input_fingerprint, status, output_artifact_id, created_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, 'PENDING', NULL, $6, NULL)",
    )
    .bind(run_id.0)
    .bind(version_id.0)
    .bind(purpose)
    .bind(prompt_hash)
    .bind(input_fingerprint)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;

    Ok(LlmRun {
        run_id,
        version_id,
        purpose: purpose.to_string(),
        prompt_hash: prompt_hash.to_string(),
        input_fingerprint: input_fingerprint.to_string(),
        status: LlmRunStatus::Pending,
        output_artifact_id: None,
        created_at: now,
        completed_at: None,
    })
}

/// `PENDING -> COMPLETED`, recording the output artifact (§4.8). A no-op,
/// not an error, if the row isn't `PENDING` — mirrors the version-status
/// conditional-update convention so redelivery of `LLM.DERIVATION_REQUESTED`
/// can't double-complete a run.
pub async fn mark_completed(pool: &PgPool, run_id: LlmRunId, output_artifact_id: ArtifactId) -> Result<bool, CoreError> {
    let now = Timestamp::now();
    let result = sqlx::query(
        "UPDATE llm_runs SET status = 'COMPLETED', output_artifact_id = $2, completed_at = $3 \
         WHERE run_id = $1 AND status = 'PENDING'",
    )
    .bind(run_id.0)
    .bind(output_artifact_id.0)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// `PENDING -> FAILED` (§4.8: "or `FAILED` with the error recorded").
pub async fn mark_failed(pool: &PgPool, run_id: LlmRunId) -> Result<bool, CoreError> {
    let now = Timestamp::now();
    let result = sqlx::query("UPDATE llm_runs SET status = 'FAILED', completed_at = $2 WHERE run_id = $1 AND status = 'PENDING'")
        .bind(run_id.0)
        .bind(now.as_datetime())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_by_id(pool: &PgPool, run_id: LlmRunId) -> Result<Option<LlmRun>, CoreError> {
    let row = sqlx::query_as::<_, LlmRunRow>(
        "SELECT run_id, version_id, purpose, prompt_hash, input_fingerprint, status, output_artifact_id, created_at, completed_at \
         FROM llm_runs WHERE run_id = $1",
    )
    .bind(run_id.0)
    .fetch_optional(pool)
    .await?;
    row.map(LlmRun::try_from).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricc_domain::{DocumentKey, PrimaryAxis, PrimaryAxisSource};

    async fn seed_version(pool: &PgPool) -> VersionId {
        let key = DocumentKey {
            title: "EU CBAM".to_string(),
            jurisdiction: "EU".to_string(),
            regulation_family: "carbon".to_string(),
            instrument_type: "regulation".to_string(),
        };
        let document =
            ricc_registry::create_document(pool, &key, PrimaryAxis::Jurisdiction, PrimaryAxisSource::DeterministicRule)
                .await
                .unwrap();
        ricc_registry::create_version(
            pool,
            ricc_registry::NewVersion {
                document_id: document.document_id,
                version_label: None,
                effective_date: None,
                parent_version_id: None,
                tenant_id: "t1".to_string(),
                effective_year: 2026,
                uploaded_by: "uploader@example.com".to_string(),
                raw_sha256: "a".repeat(64),
            },
        )
        .await
        .unwrap()
        .version_id
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_then_complete_round_trips(pool: PgPool) -> sqlx::Result<()> {
        let version_id = seed_version(&pool).await;
        let run = create_pending(&pool, version_id, "derivation", "hash1", "fp1").await.unwrap();
        assert_eq!(run.status, LlmRunStatus::Pending);

        let artifact_id = ArtifactId::new();
        assert!(mark_completed(&pool, run.run_id, artifact_id).await.unwrap());
        let reloaded = find_by_id(&pool, run.run_id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, LlmRunStatus::Completed);
        assert_eq!(reloaded.output_artifact_id, Some(artifact_id));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn completing_twice_is_a_no_op(pool: PgPool) -> sqlx::Result<()> {
        let version_id = seed_version(&pool).await;
        let run = create_pending(&pool, version_id, "derivation", "hash1", "fp1").await.unwrap();
        assert!(mark_completed(&pool, run.run_id, ArtifactId::new()).await.unwrap());
        assert!(!mark_completed(&pool, run.run_id, ArtifactId::new()).await.unwrap());
        assert!(!mark_failed(&pool, run.run_id).await.unwrap());
        Ok(())
    }
}
