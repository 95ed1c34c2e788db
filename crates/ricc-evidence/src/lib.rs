//! `ricc-evidence` — C5: write-once PDF blobs keyed by
//! `(document, version, file)` (§4.2).
//!
//! The evidence store is the exclusive owner of `evidence_files` rows
//! (§3's ownership rule). Bytes themselves are owned by the configured
//! [`ricc_store::ObjectStore`], which guarantees the write-once contract —
//! this crate never overwrites a key, it relies on the store refusing to.

use std::sync::Arc;

use ricc_core::{CoreError, DocumentId, FileId, Timestamp, VersionId};
use ricc_domain::EvidenceFile;
use ricc_store::ObjectStore;
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct EvidenceRow {
    file_id: uuid::Uuid,
    version_id: uuid::Uuid,
    sha256: String,
    mime_type: String,
    size_bytes: i64,
    storage_uri: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<EvidenceRow> for EvidenceFile {
    fn from(row: EvidenceRow) -> Self {
        EvidenceFile {
            file_id: FileId(row.file_id),
            version_id: VersionId(row.version_id),
            sha256: row.sha256,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            storage_uri: row.storage_uri,
            created_at: Timestamp::from_utc(row.created_at),
        }
    }
}

/// C5's operations over `evidence_files`, mediating between the registry
/// and the configured object store.
pub struct EvidenceService {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
}

impl EvidenceService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }

    /// Most recent evidence row with the given sha (§4.2). Multiple rows
    /// can share a sha across unrelated documents (§4.6 "tie-breaks"); the
    /// dedupe decision itself lives in `ricc-ingest`, which also consults
    /// `ricc_registry::find_dedupe_candidate`.
    pub async fn find_by_sha(&self, sha256: &str) -> Result<Option<EvidenceFile>, CoreError> {
        let row = sqlx::query_as::<_, EvidenceRow>(
            "SELECT file_id, version_id, sha256, mime_type, size_bytes, storage_uri, created_at \
             FROM evidence_files WHERE sha256 = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(sha256)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EvidenceFile::from))
    }

    /// Every evidence row with the given sha, most recent first (§4.6 step
    /// 4: "find any evidence row with `sha`"). The same bytes can live under
    /// more than one `file_id` across documents (§9's typo-fix tie-break),
    /// so the dedupe-candidate search in `ricc-ingest` must check all of
    /// them, not just the newest.
    pub async fn find_all_by_sha(&self, sha256: &str) -> Result<Vec<EvidenceFile>, CoreError> {
        let rows = sqlx::query_as::<_, EvidenceRow>(
            "SELECT file_id, version_id, sha256, mime_type, size_bytes, storage_uri, created_at \
             FROM evidence_files WHERE sha256 = $1 ORDER BY created_at DESC",
        )
        .bind(sha256)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EvidenceFile::from).collect())
    }

    pub async fn find_by_id(&self, file_id: FileId) -> Result<Option<EvidenceFile>, CoreError> {
        let row = sqlx::query_as::<_, EvidenceRow>(
            "SELECT file_id, version_id, sha256, mime_type, size_bytes, storage_uri, created_at \
             FROM evidence_files WHERE file_id = $1",
        )
        .bind(file_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EvidenceFile::from))
    }

    /// Writes raw PDF bytes to the object store at
    /// `evidence/{document_id}/{version_id}/{file_id}.pdf` (§4.2) and
    /// records the row. The object store's own write-once guarantee means
    /// a second write under a colliding key (which cannot happen here
    /// since `file_id` is freshly generated) would return the existing URI
    /// rather than overwrite — this method always mints a new `file_id`,
    /// so the caller (`ricc-ingest`) is responsible for deciding whether to
    /// call this at all versus reusing an existing evidence row.
    pub async fn create(
        &self,
        sha256: &str,
        bytes: &[u8],
        document_id: DocumentId,
        version_id: VersionId,
    ) -> Result<EvidenceFile, CoreError> {
        let file_id = FileId::new();
        let key = format!(
            "evidence/{}/{}/{}.pdf",
            document_id.as_uuid(),
            version_id.as_uuid(),
            file_id.as_uuid()
        );
        let storage_uri = self.store.put_write_once(&key, bytes, "application/pdf").await?;
        let now = Timestamp::now();

        sqlx::query(
            "INSERT INTO evidence_files \
             (file_id, version_id, sha256, mime_type, size_bytes, storage_uri, created_at) \
             VALUES ($1, $2, $3, 'application/pdf', $4, $5, $6)",
        )
        .bind(file_id.0)
        .bind(version_id.0)
        .bind(sha256)
        .bind(bytes.len() as i64)
        .bind(&storage_uri)
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await?;

        Ok(EvidenceFile {
            file_id,
            version_id,
            sha256: sha256.to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: bytes.len() as i64,
            storage_uri,
            created_at: now,
        })
    }

    /// Reads the evidence bytes back out of the object store, looking the
    /// key up from the stored `storage_uri` (§4.7 step 1: "Load evidence
    /// row by `file_id`; fetch bytes").
    pub async fn read_bytes(&self, file_id: FileId) -> Result<Vec<u8>, CoreError> {
        let evidence = self.find_by_id(file_id).await?.ok_or(CoreError::EvidenceNotFound { file_id })?;
        let location = ricc_store::parse_storage_uri(&evidence.storage_uri)?;
        let key = match location {
            ricc_store::StorageLocation::File { path } => path,
            ricc_store::StorageLocation::S3 { key, .. } => key,
        };
        self.store.get_bytes(&key).await.map_err(|e| CoreError::EvidenceReadFailed {
            file_id,
            reason: e.to_string(),
        })
    }
}
