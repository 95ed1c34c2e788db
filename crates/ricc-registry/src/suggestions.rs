//! `primary_axis_suggestions` (§3, §4.3's `upsert_primary_axis_suggestion`).
//!
//! Strictly derived-only and never read by anything that writes
//! `documents.primary_axis` — see the truth/suggestion separation in §9.
//! The unique constraint on `version_id` makes the upsert idempotent: a
//! replayed `LLM.PRIMARY_AXIS_SUGGESTED` path simply overwrites the same row.

use ricc_core::{CoreError, SuggestionId, Timestamp, VersionId};
use ricc_domain::{PrimaryAxis, PrimaryAxisSuggestion};
use sqlx::PgPool;

use crate::rows::SuggestionRow;

pub async fn find_suggestion_by_version(
    pool: &PgPool,
    version_id: VersionId,
) -> Result<Option<PrimaryAxisSuggestion>, CoreError> {
    let row = sqlx::query_as::<_, SuggestionRow>(
        "SELECT suggestion_id, version_id, suggested_axis, model_name, model_version, \
         confidence, details_json, created_at, updated_at \
         FROM primary_axis_suggestions WHERE version_id = $1",
    )
    .bind(version_id.0)
    .fetch_optional(pool)
    .await?;

    row.map(PrimaryAxisSuggestion::try_from).transpose()
}

/// Idempotent on `version_id` (§4.3): a second call for the same version
/// replaces the prior suggestion rather than erroring or duplicating.
pub async fn upsert_primary_axis_suggestion(
    pool: &PgPool,
    version_id: VersionId,
    suggested_axis: PrimaryAxis,
    model_name: &str,
    model_version: &str,
    confidence: f64,
    details_json: serde_json::Value,
) -> Result<PrimaryAxisSuggestion, CoreError> {
    let now = Timestamp::now();
    let suggestion_id = SuggestionId::new();

    sqlx::query(
        "INSERT INTO primary_axis_suggestions \
         (suggestion_id, version_id, suggested_axis, model_name, model_version, confidence, \
          details_json, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
         ON CONFLICT (version_id) DO UPDATE SET \
           suggested_axis = EXCLUDED.suggested_axis, \
           model_name = EXCLUDED.model_name, \
           model_version = EXCLUDED.model_version, \
           confidence = EXCLUDED.confidence, \
           details_json = EXCLUDED.details_json, \
           updated_at = EXCLUDED.updated_at",
    )
    .bind(suggestion_id.0)
    .bind(version_id.0)
    .bind(suggested_axis.as_str())
    .bind(model_name)
    .bind(model_version)
    .bind(confidence)
    .bind(&details_json)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;

    find_suggestion_by_version(pool, version_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { what: format!("suggestion for version {version_id}") })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricc_domain::{DocumentKey, PrimaryAxisSource};

    async fn seed_version(pool: &PgPool) -> VersionId {
        let key = DocumentKey {
            title: "EU CBAM".to_string(),
            jurisdiction: "EU".to_string(),
            regulation_family: "carbon".to_string(),
            instrument_type: "regulation".to_string(),
        };
        let document = crate::documents::create_document(
            pool,
            &key,
            PrimaryAxis::Jurisdiction,
            PrimaryAxisSource::DeterministicRule,
        )
        .await
        .unwrap();
        let version = crate::versions::create_version(
            pool,
            crate::versions::NewVersion {
                document_id: document.document_id,
                version_label: None,
                effective_date: None,
                parent_version_id: None,
                tenant_id: "t1".to_string(),
                effective_year: 2026,
                uploaded_by: "u".to_string(),
                raw_sha256: "a".repeat(64),
            },
        )
        .await
        .unwrap();
        version.version_id
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn upsert_is_idempotent_on_version(pool: PgPool) -> sqlx::Result<()> {
        let version_id = seed_version(&pool).await;

        upsert_primary_axis_suggestion(
            &pool,
            version_id,
            PrimaryAxis::Theme,
            "stub-llm",
            "0",
            0.42,
            serde_json::json!({"reasoning": "first pass"}),
        )
        .await
        .unwrap();

        let updated = upsert_primary_axis_suggestion(
            &pool,
            version_id,
            PrimaryAxis::ProductScope,
            "stub-llm",
            "1",
            0.91,
            serde_json::json!({"reasoning": "second pass"}),
        )
        .await
        .unwrap();

        assert_eq!(updated.suggested_axis, PrimaryAxis::ProductScope);
        assert_eq!(updated.confidence, 0.91);

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM primary_axis_suggestions WHERE version_id = $1")
            .bind(version_id.0)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        Ok(())
    }
}
