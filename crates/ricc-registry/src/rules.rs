//! Table-driven upload validation rules (§3's `UploadRules`, supplemental —
//! grounded in the pre-distillation implementation's `refdata/rules.py`).
//!
//! Loaded once per process at startup and held in `AppState` (§9 "Global
//! process state"): a rules change takes effect on the next restart, not
//! mid-process, matching the frozen-config-snapshot policy applied
//! everywhere else in this service.

use ricc_core::{CoreError, Timestamp};
use ricc_domain::UploadRules;
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct UploadRulesRow {
    rules_version: String,
    required_fields: serde_json::Value,
    max_pdf_mb: i32,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<UploadRulesRow> for UploadRules {
    type Error = CoreError;

    fn try_from(row: UploadRulesRow) -> Result<Self, Self::Error> {
        let required_fields: Vec<String> = serde_json::from_value(row.required_fields)
            .map_err(ricc_core::CanonicalizationError::from)?;
        Ok(UploadRules {
            rules_version: row.rules_version,
            required_fields,
            max_pdf_mb: row.max_pdf_mb as u32,
            updated_at: Timestamp::from_utc(row.updated_at),
        })
    }
}

/// Loads the single `is_active = true` row, falling back to
/// [`UploadRules::default`] when the table has never been seeded — so a
/// fresh deployment works out of the box without an operator having to
/// insert a rules row first.
pub async fn load_active_rules(pool: &PgPool) -> Result<UploadRules, CoreError> {
    let row = sqlx::query_as::<_, UploadRulesRow>(
        "SELECT rules_version, required_fields, max_pdf_mb, updated_at \
         FROM upload_rules WHERE is_active LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => UploadRules::try_from(row),
        None => Ok(UploadRules::default()),
    }
}

/// Replaces the active rule set, deactivating any prior active row.
/// Used by the `ricc-cli` operator surface, never by the ingestion path.
pub async fn set_active_rules(pool: &PgPool, rules: &UploadRules) -> Result<(), CoreError> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE upload_rules SET is_active = FALSE WHERE is_active").execute(&mut *tx).await?;
    sqlx::query(
        "INSERT INTO upload_rules (rules_version, required_fields, max_pdf_mb, is_active, updated_at) \
         VALUES ($1, $2, $3, TRUE, $4) \
         ON CONFLICT (rules_version) DO UPDATE SET \
           required_fields = EXCLUDED.required_fields, \
           max_pdf_mb = EXCLUDED.max_pdf_mb, \
           is_active = TRUE, \
           updated_at = EXCLUDED.updated_at",
    )
    .bind(&rules.rules_version)
    .bind(serde_json::to_value(&rules.required_fields).map_err(ricc_core::CanonicalizationError::from)?)
    .bind(rules.max_pdf_mb as i32)
    .bind(rules.updated_at.as_datetime())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn falls_back_to_default_when_unseeded(pool: PgPool) -> sqlx::Result<()> {
        let rules = load_active_rules(&pool).await.unwrap();
        let default = UploadRules::default();
        assert_eq!(rules.rules_version, default.rules_version);
        assert_eq!(rules.required_fields, default.required_fields);
        assert_eq!(rules.max_pdf_mb, default.max_pdf_mb);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn set_then_load_round_trips(pool: PgPool) -> sqlx::Result<()> {
        let mut rules = UploadRules::default();
        rules.rules_version = "v2".to_string();
        rules.max_pdf_mb = 75;

        set_active_rules(&pool, &rules).await.unwrap();
        let loaded = load_active_rules(&pool).await.unwrap();
        assert_eq!(loaded.rules_version, "v2");
        assert_eq!(loaded.max_pdf_mb, 75);
        Ok(())
    }
}
