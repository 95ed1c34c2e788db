//! `ricc-artifacts` — C7: the derived-artifact service (§4.4).
//!
//! The exclusive owner of `derived_artifacts` and `chunks` rows. Every
//! artifact is content-addressed and write-once: the byte store refuses a
//! second write under the same key, and this crate never updates a row
//! after insert. JSON artifacts are always serialized through
//! [`ricc_core::CanonicalBytes`] so their `sha256` is reproducible from the
//! same logical content, never from incidental key ordering or whitespace.

mod rows;

use std::sync::Arc;

use ricc_core::{sha256_canonical_hex, sha256_hex, ArtifactId, CanonicalBytes, CoreError, Timestamp, VersionId};
use ricc_domain::{ArtifactKind, Chunk, ChunkSpan, ChunkingManifest, DerivedArtifact};
use ricc_store::ObjectStore;
use rows::{ArtifactRow, ChunkRow};
use serde::Serialize;
use sqlx::PgPool;

/// The three canonical-extraction artifacts produced by the canonicalize
/// worker's step 3 (§4.7).
pub struct CanonicalArtifactIds {
    pub stable_text_id: ArtifactId,
    pub page_map_id: ArtifactId,
    pub layout_map_id: ArtifactId,
}

/// Result of a char-artifact lookup or generation request (§4.4.1). Either
/// an artifact id (freshly generated or already on file) or a structured
/// refusal — never an error, since exceeding the page limit is an expected
/// outcome, not a failure.
pub enum CharArtifactOutcome {
    Available(ArtifactId),
    NotAvailable { reason: String },
}

pub struct ArtifactService {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
    char_artifact_max_pages: usize,
}

impl ArtifactService {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>, char_artifact_max_pages: usize) -> Self {
        Self { pool, store, char_artifact_max_pages }
    }

    pub async fn find_by_id(&self, artifact_id: ArtifactId) -> Result<Option<DerivedArtifact>, CoreError> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            "SELECT artifact_id, version_id, kind, sha256, storage_uri, generator_name, generator_version, created_at \
             FROM derived_artifacts WHERE artifact_id = $1",
        )
        .bind(artifact_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(DerivedArtifact::try_from).transpose()
    }

    pub async fn find_by_version_and_kind(
        &self,
        version_id: VersionId,
        kind: ArtifactKind,
    ) -> Result<Option<DerivedArtifact>, CoreError> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            "SELECT artifact_id, version_id, kind, sha256, storage_uri, generator_name, generator_version, created_at \
             FROM derived_artifacts WHERE version_id = $1 AND kind = $2 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(version_id.0)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(DerivedArtifact::try_from).transpose()
    }

    /// `register(version, kind, bytes, key, gen_name, gen_version)` (§4.4):
    /// writes raw bytes to the object store under `key` (write-once) and
    /// inserts the row. Callers that have JSON rather than raw bytes should
    /// go through [`Self::store_json_artifact`], which canonicalizes first.
    pub async fn register(
        &self,
        version_id: VersionId,
        kind: ArtifactKind,
        bytes: &[u8],
        key: &str,
        content_type: &str,
        generator_name: &str,
        generator_version: &str,
    ) -> Result<ArtifactId, CoreError> {
        let sha256 = sha256_hex(bytes);
        let storage_uri = self.store.put_write_once(key, bytes, content_type).await?;
        let artifact_id = ArtifactId::new();
        let now = Timestamp::now();

        sqlx::query(
            "INSERT INTO derived_artifacts \
             (artifact_id, version_id, kind, sha256, storage_uri, generator_name, generator_version, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(artifact_id.0)
        .bind(version_id.0)
        .bind(kind.as_str())
        .bind(&sha256)
        .bind(&storage_uri)
        .bind(generator_name)
        .bind(generator_version)
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await?;

        Ok(artifact_id)
    }

    /// General-purpose path for any JSON-shaped artifact (`retrieval_manifest`,
    /// `llm_output`, `char_map`, `char_boxes`, and `chunk_set` via
    /// [`Self::store_chunk_set`]) — serializes canonically before handing
    /// bytes to [`Self::register`], so `sha256` is reproducible from the
    /// logical value alone.
    pub async fn store_json_artifact(
        &self,
        version_id: VersionId,
        kind: ArtifactKind,
        value: &impl Serialize,
        key: &str,
        generator_name: &str,
        generator_version: &str,
    ) -> Result<ArtifactId, CoreError> {
        let canonical = CanonicalBytes::new(value)?;
        self.register(version_id, kind, canonical.as_bytes(), key, "application/json", generator_name, generator_version)
            .await
    }

    /// Produces `stable_text`, `page_map`, `layout_map` under
    /// `canonical/{version_id}/...` (§4.4).
    pub async fn store_canonical(
        &self,
        version_id: VersionId,
        stable_text: &str,
        page_map: &impl Serialize,
        layout_map: &impl Serialize,
        extractor_version: &str,
    ) -> Result<CanonicalArtifactIds, CoreError> {
        let stable_text_key = format!("canonical/{}/stable_text.txt", version_id.as_uuid());
        let stable_text_id = self
            .register(
                version_id,
                ArtifactKind::StableText,
                stable_text.as_bytes(),
                &stable_text_key,
                "text/plain; charset=utf-8",
                "canonicalize-worker",
                extractor_version,
            )
            .await?;

        let page_map_key = format!("canonical/{}/page_map.json", version_id.as_uuid());
        let page_map_id = self
            .store_json_artifact(
                version_id,
                ArtifactKind::PageMap,
                page_map,
                &page_map_key,
                "canonicalize-worker",
                extractor_version,
            )
            .await?;

        let layout_map_key = format!("canonical/{}/layout_map.json", version_id.as_uuid());
        let layout_map_id = self
            .store_json_artifact(
                version_id,
                ArtifactKind::LayoutMap,
                layout_map,
                &layout_map_key,
                "canonicalize-worker",
                extractor_version,
            )
            .await?;

        Ok(CanonicalArtifactIds { stable_text_id, page_map_id, layout_map_id })
    }

    /// `indexes/{version_id}/chunk_sets/chunk_set.json` (§4.4).
    pub async fn store_chunk_set(
        &self,
        version_id: VersionId,
        manifest: &ChunkingManifest,
        spans: &[ChunkSpan],
        chunker_version: &str,
    ) -> Result<ArtifactId, CoreError> {
        #[derive(Serialize)]
        struct ChunkSetDoc<'a> {
            manifest: &'a ChunkingManifest,
            chunks: &'a [ChunkSpan],
        }
        let key = format!("indexes/{}/chunk_sets/chunk_set.json", version_id.as_uuid());
        self.store_json_artifact(
            version_id,
            ArtifactKind::ChunkSet,
            &ChunkSetDoc { manifest, chunks: spans },
            &key,
            "canonicalize-worker",
            chunker_version,
        )
        .await
    }

    /// Inserts one `chunks` row per span (§4.7 step 6). `chunk_set_artifact_id`
    /// must already be registered via [`Self::store_chunk_set`].
    pub async fn insert_chunks(
        &self,
        version_id: VersionId,
        chunk_set_artifact_id: ArtifactId,
        chunk_schema_version: &str,
        spans: &[ChunkSpan],
    ) -> Result<Vec<Chunk>, CoreError> {
        let mut chunks = Vec::with_capacity(spans.len());
        for span in spans {
            let chunk_id = ricc_core::ChunkId::new();
            sqlx::query(
                "INSERT INTO chunks \
                 (chunk_id, version_id, chunk_set_artifact_id, chunk_schema_version, start_char, end_char, page_start, page_end, text_sha256) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(chunk_id.0)
            .bind(version_id.0)
            .bind(chunk_set_artifact_id.0)
            .bind(chunk_schema_version)
            .bind(span.start_char as i64)
            .bind(span.end_char as i64)
            .bind(span.page_start as i32)
            .bind(span.page_end as i32)
            .bind(&span.text_sha256)
            .execute(&self.pool)
            .await?;

            chunks.push(Chunk {
                chunk_id,
                version_id,
                chunk_set_artifact_id,
                chunk_schema_version: chunk_schema_version.to_string(),
                start_char: span.start_char,
                end_char: span.end_char,
                page_start: span.page_start,
                page_end: span.page_end,
                text_sha256: span.text_sha256.clone(),
            });
        }
        Ok(chunks)
    }

    /// Reads an artifact's bytes back out of the object store (§4.8's LLM
    /// worker reading the `stable_text` artifact bytes), mirroring
    /// `EvidenceService::read_bytes`.
    pub async fn read_bytes(&self, artifact_id: ArtifactId) -> Result<Vec<u8>, CoreError> {
        let artifact = self
            .find_by_id(artifact_id)
            .await?
            .ok_or_else(|| CoreError::NotFound { what: format!("artifact {artifact_id}") })?;
        let location = ricc_store::parse_storage_uri(&artifact.storage_uri)?;
        let key = match location {
            ricc_store::StorageLocation::File { path } => path,
            ricc_store::StorageLocation::S3 { key, .. } => key,
        };
        self.store
            .get_bytes(&key)
            .await
            .map_err(|e| CoreError::StorageWriteFailed { key, reason: e.to_string() })
    }

    /// Count of derived artifacts registered for a version (§4.9's projector
    /// recount on `INGESTION.COMPLETED`).
    pub async fn count_for_version(&self, version_id: VersionId) -> Result<i64, CoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM derived_artifacts WHERE version_id = $1")
            .bind(version_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_chunks(&self, version_id: VersionId) -> Result<Vec<Chunk>, CoreError> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            "SELECT chunk_id, version_id, chunk_set_artifact_id, chunk_schema_version, start_char, end_char, page_start, page_end, text_sha256 \
             FROM chunks WHERE version_id = $1 ORDER BY start_char ASC",
        )
        .bind(version_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Chunk::from).collect())
    }

    /// Lazy char-artifact generation (§4.4.1). Idempotent: a version that
    /// already has a `char_map` row returns its id rather than regenerating
    /// (the artifact, once written, is immutable like all others). Skips
    /// generation — returning [`CharArtifactOutcome::NotAvailable`] rather
    /// than an error — when the page count exceeds the configured limit.
    pub async fn get_or_generate_char_map(
        &self,
        version_id: VersionId,
        page_count: usize,
        build: impl FnOnce() -> serde_json::Value,
        generator_version: &str,
    ) -> Result<CharArtifactOutcome, CoreError> {
        if let Some(existing) = self.find_by_version_and_kind(version_id, ArtifactKind::CharMap).await? {
            return Ok(CharArtifactOutcome::Available(existing.artifact_id));
        }
        if page_count > self.char_artifact_max_pages {
            return Ok(CharArtifactOutcome::NotAvailable {
                reason: format!(
                    "page_map has {page_count} pages, exceeding char_artifact_max_pages={}",
                    self.char_artifact_max_pages
                ),
            });
        }
        let key = format!("canonical/{}/char_map.json", version_id.as_uuid());
        let artifact_id = self
            .store_json_artifact(version_id, ArtifactKind::CharMap, &build(), &key, "char-artifacts", generator_version)
            .await?;
        Ok(CharArtifactOutcome::Available(artifact_id))
    }

    /// Same lazy/idempotent/page-limited contract as
    /// [`Self::get_or_generate_char_map`], for the `char_boxes` kind.
    pub async fn get_or_generate_char_boxes(
        &self,
        version_id: VersionId,
        page_count: usize,
        build: impl FnOnce() -> serde_json::Value,
        generator_version: &str,
    ) -> Result<CharArtifactOutcome, CoreError> {
        if let Some(existing) = self.find_by_version_and_kind(version_id, ArtifactKind::CharBoxes).await? {
            return Ok(CharArtifactOutcome::Available(existing.artifact_id));
        }
        if page_count > self.char_artifact_max_pages {
            return Ok(CharArtifactOutcome::NotAvailable {
                reason: format!(
                    "page_map has {page_count} pages, exceeding char_artifact_max_pages={}",
                    self.char_artifact_max_pages
                ),
            });
        }
        let key = format!("canonical/{}/char_boxes.json", version_id.as_uuid());
        let artifact_id = self
            .store_json_artifact(version_id, ArtifactKind::CharBoxes, &build(), &key, "char-artifacts", generator_version)
            .await?;
        Ok(CharArtifactOutcome::Available(artifact_id))
    }
}

/// Recomputes the canonical sha256 of a JSON value the way
/// [`ArtifactService::store_json_artifact`] does, for callers (e.g. the
/// retrieval_manifest assembler) that need to reference an artifact's hash
/// before it's registered.
pub fn canonical_sha256(value: &impl Serialize) -> Result<String, CoreError> {
    let canonical = CanonicalBytes::new(value)?;
    Ok(sha256_canonical_hex(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricc_store::LocalFsStore;
    use serde_json::json;

    async fn service(pool: PgPool, max_pages: usize) -> (ArtifactService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path()).await.unwrap();
        (ArtifactService::new(pool, Arc::new(store), max_pages), dir)
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn store_canonical_registers_three_artifacts(pool: PgPool) -> sqlx::Result<()> {
        let (svc, _dir) = service(pool, 100).await;
        let version_id = VersionId::new();
        let page_map = json!([{"page": 1, "start_char": 0, "end_char": 10}]);
        let layout_map = json!({"lines": []});

        let ids = svc.store_canonical(version_id, "hello world", &page_map, &layout_map, "extractor-v1").await.unwrap();
        assert!(svc.find_by_id(ids.stable_text_id).await.unwrap().is_some());
        assert!(svc.find_by_id(ids.page_map_id).await.unwrap().is_some());
        assert!(svc.find_by_id(ids.layout_map_id).await.unwrap().is_some());
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn json_artifact_sha_is_reproducible_regardless_of_key_order(pool: PgPool) -> sqlx::Result<()> {
        let (svc, _dir) = service(pool, 100).await;
        let version_id = VersionId::new();
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});

        let id_a = svc
            .store_json_artifact(version_id, ArtifactKind::RetrievalManifest, &a, "indexes/a.json", "gen", "v1")
            .await
            .unwrap();
        let artifact_a = svc.find_by_id(id_a).await.unwrap().unwrap();
        let sha_b = canonical_sha256(&b).unwrap();
        assert_eq!(artifact_a.sha256, sha_b);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn chunk_set_round_trips_chunk_rows(pool: PgPool) -> sqlx::Result<()> {
        let (svc, _dir) = service(pool, 100).await;
        let version_id = VersionId::new();
        let manifest = ChunkingManifest { max_chars: 1000, overlap_chars: 0, split: "paragraph".to_string(), count: 2 };
        let spans = vec![
            ChunkSpan { start_char: 0, end_char: 5, page_start: 1, page_end: 1, text_sha256: sha256_hex(b"hello") },
            ChunkSpan { start_char: 5, end_char: 10, page_start: 1, page_end: 1, text_sha256: sha256_hex(b"world") },
        ];
        let artifact_id = svc.store_chunk_set(version_id, &manifest, &spans, "chunker-v1").await.unwrap();
        let chunks = svc.insert_chunks(version_id, artifact_id, "v1", &spans).await.unwrap();
        assert_eq!(chunks.len(), 2);

        let listed = svc.list_chunks(version_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].start_char, 0);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn char_map_skipped_above_page_limit(pool: PgPool) -> sqlx::Result<()> {
        let (svc, _dir) = service(pool, 10).await;
        let version_id = VersionId::new();
        let outcome = svc
            .get_or_generate_char_map(version_id, 11, || json!([]), "char-v1")
            .await
            .unwrap();
        assert!(matches!(outcome, CharArtifactOutcome::NotAvailable { .. }));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn read_bytes_round_trips_registered_content(pool: PgPool) -> sqlx::Result<()> {
        let (svc, _dir) = service(pool, 100).await;
        let version_id = VersionId::new();
        let ids = svc
            .store_canonical(version_id, "hello world", &json!([]), &json!({"lines": []}), "extractor-v1")
            .await
            .unwrap();
        let bytes = svc.read_bytes(ids.stable_text_id).await.unwrap();
        assert_eq!(bytes, b"hello world");
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn count_for_version_reflects_registered_artifacts(pool: PgPool) -> sqlx::Result<()> {
        let (svc, _dir) = service(pool, 100).await;
        let version_id = VersionId::new();
        assert_eq!(svc.count_for_version(version_id).await.unwrap(), 0);
        svc.store_canonical(version_id, "text", &json!([]), &json!({"lines": []}), "extractor-v1").await.unwrap();
        assert_eq!(svc.count_for_version(version_id).await.unwrap(), 3);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn char_map_generation_is_idempotent(pool: PgPool) -> sqlx::Result<()> {
        let (svc, _dir) = service(pool, 10).await;
        let version_id = VersionId::new();
        let first = svc.get_or_generate_char_map(version_id, 2, || json!([{"char_index": 0}]), "char-v1").await.unwrap();
        let second = svc.get_or_generate_char_map(version_id, 2, || panic!("must not regenerate"), "char-v1").await.unwrap();

        let (CharArtifactOutcome::Available(id1), CharArtifactOutcome::Available(id2)) = (first, second) else {
            panic!("expected both outcomes to be Available");
        };
        assert_eq!(id1, id2);
        Ok(())
    }
}
