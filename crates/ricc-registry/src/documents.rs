//! Find-or-create for the `documents` table (§4.3, §4.6 step 6).
//!
//! `primary_axis` is truth: [`find_document_by_metadata`] never receives a
//! way to mutate it, and [`create_document`] is the only writer. A document
//! that already exists with a different `primary_axis` is a caller error
//! (`PRIMARY_AXIS_MISMATCH`), surfaced by `ricc-ingest`, not here — this
//! module only reads and writes rows.

use ricc_core::{CoreError, DocumentId, Timestamp};
use ricc_domain::{Document, DocumentKey, PrimaryAxis, PrimaryAxisSource};
use sqlx::PgPool;

use crate::rows::DocumentRow;

/// Looks up a document by its identity 4-tuple (§3's unique constraint).
pub async fn find_document_by_metadata(
    pool: &PgPool,
    key: &DocumentKey,
) -> Result<Option<Document>, CoreError> {
    let row = sqlx::query_as::<_, DocumentRow>(
        "SELECT document_id, title, jurisdiction, regulation_family, instrument_type, \
         primary_axis, primary_axis_source, created_at, updated_at \
         FROM documents \
         WHERE title = $1 AND jurisdiction = $2 AND regulation_family = $3 AND instrument_type = $4",
    )
    .bind(&key.title)
    .bind(&key.jurisdiction)
    .bind(&key.regulation_family)
    .bind(&key.instrument_type)
    .fetch_optional(pool)
    .await?;

    row.map(Document::try_from).transpose()
}

pub async fn find_document_by_id(pool: &PgPool, document_id: DocumentId) -> Result<Option<Document>, CoreError> {
    let row = sqlx::query_as::<_, DocumentRow>(
        "SELECT document_id, title, jurisdiction, regulation_family, instrument_type, \
         primary_axis, primary_axis_source, created_at, updated_at \
         FROM documents WHERE document_id = $1",
    )
    .bind(document_id.0)
    .fetch_optional(pool)
    .await?;

    row.map(Document::try_from).transpose()
}

/// Inserts a new document, persisting both the truth value and its
/// provenance (§3: `primary_axis_source ∈ {UPLOAD, DETERMINISTIC_RULE}`).
///
/// A unique-constraint violation on the identity 4-tuple is surfaced as
/// [`CoreError::DuplicateKey`] — the caller (`ricc-ingest`) recovers by
/// re-reading via [`find_document_by_metadata`] (§7's `DUPLICATE_KEY`
/// recovery path for a concurrent create race).
pub async fn create_document(
    pool: &PgPool,
    key: &DocumentKey,
    primary_axis: PrimaryAxis,
    primary_axis_source: PrimaryAxisSource,
) -> Result<Document, CoreError> {
    let document_id = DocumentId::new();
    let now = Timestamp::now();

    let result = sqlx::query(
        "INSERT INTO documents \
         (document_id, title, jurisdiction, regulation_family, instrument_type, \
          primary_axis, primary_axis_source, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)",
    )
    .bind(document_id.0)
    .bind(&key.title)
    .bind(&key.jurisdiction)
    .bind(&key.regulation_family)
    .bind(&key.instrument_type)
    .bind(primary_axis.as_str())
    .bind(primary_axis_source.as_str())
    .bind(now.as_datetime())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(Document {
            document_id,
            title: key.title.clone(),
            jurisdiction: key.jurisdiction.clone(),
            regulation_family: key.regulation_family.clone(),
            instrument_type: key.instrument_type.clone(),
            primary_axis,
            primary_axis_source,
            created_at: now,
            updated_at: now,
        }),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(CoreError::DuplicateKey { constraint: "documents_identity_key".to_string() })
        }
        Err(e) => Err(CoreError::Db(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DocumentKey {
        DocumentKey {
            title: "EU CBAM".to_string(),
            jurisdiction: "EU".to_string(),
            regulation_family: "carbon".to_string(),
            instrument_type: "regulation".to_string(),
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn create_then_find_round_trips(pool: PgPool) -> sqlx::Result<()> {
        let k = key();
        let doc = create_document(&pool, &k, PrimaryAxis::Jurisdiction, PrimaryAxisSource::DeterministicRule)
            .await
            .unwrap();
        let found = find_document_by_metadata(&pool, &k).await.unwrap().unwrap();
        assert_eq!(found.document_id, doc.document_id);
        assert_eq!(found.primary_axis, PrimaryAxis::Jurisdiction);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn missing_document_returns_none(pool: PgPool) -> sqlx::Result<()> {
        let found = find_document_by_metadata(&pool, &key()).await.unwrap();
        assert!(found.is_none());
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn duplicate_identity_is_reported(pool: PgPool) -> sqlx::Result<()> {
        let k = key();
        create_document(&pool, &k, PrimaryAxis::Jurisdiction, PrimaryAxisSource::DeterministicRule)
            .await
            .unwrap();
        let err = create_document(&pool, &k, PrimaryAxis::Jurisdiction, PrimaryAxisSource::DeterministicRule)
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
        Ok(())
    }
}
