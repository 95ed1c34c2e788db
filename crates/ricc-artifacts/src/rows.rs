//! Row types for `derived_artifacts` and `chunks`, and their conversions
//! into [`ricc_domain::model`] types.

use std::str::FromStr;

use ricc_core::{ArtifactId, ChunkId, CoreError, Timestamp, VersionId};
use ricc_domain::{ArtifactKind, Chunk, DerivedArtifact, ParseEnumError};

fn parse_enum_field<T>(field: &'static str, raw: &str) -> Result<T, CoreError>
where
    T: FromStr<Err = ParseEnumError>,
{
    raw.parse().map_err(|ParseEnumError(value)| {
        CoreError::Db(sqlx::Error::ColumnDecode {
            index: field.to_string(),
            source: format!("unrecognized value {value:?}").into(),
        })
    })
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArtifactRow {
    pub artifact_id: uuid::Uuid,
    pub version_id: uuid::Uuid,
    pub kind: String,
    pub sha256: String,
    pub storage_uri: String,
    pub generator_name: String,
    pub generator_version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<ArtifactRow> for DerivedArtifact {
    type Error = CoreError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        Ok(DerivedArtifact {
            artifact_id: ArtifactId(row.artifact_id),
            version_id: VersionId(row.version_id),
            kind: parse_enum_field::<ArtifactKind>("kind", &row.kind)?,
            sha256: row.sha256,
            storage_uri: row.storage_uri,
            generator_name: row.generator_name,
            generator_version: row.generator_version,
            created_at: Timestamp::from_utc(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ChunkRow {
    pub chunk_id: uuid::Uuid,
    pub version_id: uuid::Uuid,
    pub chunk_set_artifact_id: uuid::Uuid,
    pub chunk_schema_version: String,
    pub start_char: i64,
    pub end_char: i64,
    pub page_start: i32,
    pub page_end: i32,
    pub text_sha256: String,
}

impl From<ChunkRow> for Chunk {
    fn from(row: ChunkRow) -> Self {
        Chunk {
            chunk_id: ChunkId(row.chunk_id),
            version_id: VersionId(row.version_id),
            chunk_set_artifact_id: ArtifactId(row.chunk_set_artifact_id),
            chunk_schema_version: row.chunk_schema_version,
            start_char: row.start_char as usize,
            end_char: row.end_char as usize,
            page_start: row.page_start as u32,
            page_end: row.page_end as u32,
            text_sha256: row.text_sha256,
        }
    }
}
