//! Row types mirroring `migrations/0001_init.sql`'s `documents`,
//! `document_versions`, and `primary_axis_suggestions` tables, plus their
//! `TryFrom` conversions into `ricc_domain::model` types.
//!
//! Kept separate from `ricc-domain` so that crate stays free of a direct
//! `sqlx` dependency (see its module doc) — only the crates that actually
//! talk to Postgres know what a "row" looks like.

use std::str::FromStr;

use ricc_core::{CoreError, DocumentId, FileId, SuggestionId, Timestamp, VersionId};
use ricc_domain::{
    Document, DocumentVersion, ParseEnumError, PrimaryAxis, PrimaryAxisSource,
    PrimaryAxisSuggestion, VersionStatus,
};

fn parse_enum_field<T>(field: &'static str, raw: &str) -> Result<T, CoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.parse().map_err(|ParseEnumError(value)| CoreError::Db(sqlx::Error::ColumnDecode {
        index: field.to_string(),
        source: format!("unrecognized value {value:?}").into(),
    }))
}

#[derive(Debug, sqlx::FromRow)]
pub struct DocumentRow {
    pub document_id: uuid::Uuid,
    pub title: String,
    pub jurisdiction: String,
    pub regulation_family: String,
    pub instrument_type: String,
    pub primary_axis: String,
    pub primary_axis_source: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = CoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            document_id: DocumentId(row.document_id),
            title: row.title,
            jurisdiction: row.jurisdiction,
            regulation_family: row.regulation_family,
            instrument_type: row.instrument_type,
            primary_axis: parse_enum_field::<PrimaryAxis>("primary_axis", &row.primary_axis)?,
            primary_axis_source: parse_enum_field::<PrimaryAxisSource>(
                "primary_axis_source",
                &row.primary_axis_source,
            )?,
            created_at: Timestamp::from_utc(row.created_at),
            updated_at: Timestamp::from_utc(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct VersionRow {
    pub version_id: uuid::Uuid,
    pub document_id: uuid::Uuid,
    pub version_label: Option<String>,
    pub effective_date: Option<chrono::NaiveDate>,
    pub parent_version_id: Option<uuid::Uuid>,
    pub tenant_id: String,
    pub effective_year: i32,
    pub uploaded_by: String,
    pub uploaded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub raw_sha256: String,
    pub file_id: Option<uuid::Uuid>,
    pub status: String,
    pub artifacts_json: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<VersionRow> for DocumentVersion {
    type Error = CoreError;

    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        Ok(DocumentVersion {
            version_id: VersionId(row.version_id),
            document_id: DocumentId(row.document_id),
            version_label: row.version_label,
            effective_date: row.effective_date,
            parent_version_id: row.parent_version_id.map(VersionId),
            tenant_id: row.tenant_id,
            effective_year: row.effective_year,
            uploaded_by: row.uploaded_by,
            uploaded_at: row.uploaded_at.map(Timestamp::from_utc),
            raw_sha256: row.raw_sha256,
            file_id: row.file_id.map(FileId),
            status: parse_enum_field::<VersionStatus>("status", &row.status)?,
            artifacts_json: row.artifacts_json,
            created_at: Timestamp::from_utc(row.created_at),
            updated_at: Timestamp::from_utc(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SuggestionRow {
    pub suggestion_id: uuid::Uuid,
    pub version_id: uuid::Uuid,
    pub suggested_axis: String,
    pub model_name: String,
    pub model_version: String,
    pub confidence: f64,
    pub details_json: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<SuggestionRow> for PrimaryAxisSuggestion {
    type Error = CoreError;

    fn try_from(row: SuggestionRow) -> Result<Self, Self::Error> {
        Ok(PrimaryAxisSuggestion {
            suggestion_id: SuggestionId(row.suggestion_id),
            version_id: VersionId(row.version_id),
            suggested_axis: parse_enum_field::<PrimaryAxis>("suggested_axis", &row.suggested_axis)?,
            model_name: row.model_name,
            model_version: row.model_version,
            confidence: row.confidence,
            details_json: row.details_json,
            created_at: Timestamp::from_utc(row.created_at),
            updated_at: Timestamp::from_utc(row.updated_at),
        })
    }
}
