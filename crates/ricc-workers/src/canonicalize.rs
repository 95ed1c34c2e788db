//! C10: the canonicalize worker (§4.7).
//!
//! Consumes `REGISTRY.VERSION_CREATED`. Every step is auditable against
//! `version_id`'s entity chain; a failure at any point before the
//! `PENDING -> ACTIVE` transition fails the version instead of leaving it
//! stuck, since a `FAILED` version is never resurrected (§7) — a retry is a
//! new upload, not a redrive of this one.

use std::sync::Arc;
use std::time::Duration;

use ricc_audit::AuditService;
use ricc_artifacts::ArtifactService;
use ricc_bus::Bus;
use ricc_core::{CoreError, CorrelationId, FileId, VersionId};
use ricc_domain::{DomainEvent, EntityType, EventType, Extractor, LayoutLine};
use ricc_evidence::EvidenceService;
use serde::Serialize;
use sqlx::PgPool;

use crate::retry::retry_bounded;

/// A `{lines: [...]}` wrapper matching the `layout_map` artifact's shape
/// (§4.4.7 step 2) — `ExtractionOutput::layout_lines` itself is a bare list.
#[derive(Serialize)]
struct LayoutMap<'a> {
    lines: &'a [LayoutLine],
}

pub struct CanonicalizeWorker {
    pool: PgPool,
    evidence: EvidenceService,
    artifacts: ArtifactService,
    audit: AuditService,
    bus: Arc<dyn Bus>,
    extractor: Arc<dyn Extractor>,
    extractor_version: String,
    layout_version: String,
    chunker_version: String,
    chunk_schema_version: String,
    chunk_max_chars: usize,
    chunk_overlap_chars: usize,
    retrieval_max_context_tokens: u32,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl CanonicalizeWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        evidence: EvidenceService,
        artifacts: ArtifactService,
        audit: AuditService,
        bus: Arc<dyn Bus>,
        extractor: Arc<dyn Extractor>,
        extractor_version: impl Into<String>,
        layout_version: impl Into<String>,
        chunker_version: impl Into<String>,
        chunk_schema_version: impl Into<String>,
        chunk_max_chars: usize,
        chunk_overlap_chars: usize,
        retrieval_max_context_tokens: u32,
        retry_attempts: u32,
        retry_base_delay: Duration,
    ) -> Self {
        Self {
            pool,
            evidence,
            artifacts,
            audit,
            bus,
            extractor,
            extractor_version: extractor_version.into(),
            layout_version: layout_version.into(),
            chunker_version: chunker_version.into(),
            chunk_schema_version: chunk_schema_version.into(),
            chunk_max_chars,
            chunk_overlap_chars,
            retrieval_max_context_tokens,
            retry_attempts,
            retry_base_delay,
        }
    }

    /// Runs the consume loop forever, one event at a time. A lagged or
    /// closed subscription ends the loop; callers run this inside a
    /// dedicated task per worker process.
    pub async fn run(&self, bus: &dyn Bus) -> Result<(), CoreError> {
        let mut sub = bus.subscribe("canonicalize-worker");
        loop {
            let event = sub.recv().await?;
            if event.event_type != EventType::RegistryVersionCreated {
                continue;
            }
            if let Err(e) = self.handle_event(&event).await {
                tracing::error!(error = %e, entity_id = %event.entity_id, "canonicalize worker failed to process event");
            }
        }
    }

    async fn audit_version(
        &self,
        version_id: VersionId,
        correlation_id: CorrelationId,
        action: &str,
        details: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.audit
            .write(EntityType::Version, &version_id.to_string(), action, "canonicalize-worker", correlation_id, details)
            .await?;
        Ok(())
    }

    async fn fail_version(
        &self,
        version_id: VersionId,
        correlation_id: CorrelationId,
        reason: &str,
    ) -> Result<(), CoreError> {
        ricc_registry::set_status_pending_to_failed(&self.pool, version_id).await?;
        self.audit_version(version_id, correlation_id, "INGESTION.FAILED", serde_json::json!({"reason": reason}))
            .await?;
        let event = DomainEvent::new(
            EventType::IngestionFailed,
            correlation_id,
            "canonicalize-worker",
            EntityType::Version,
            version_id.to_string(),
            serde_json::json!({"reason": reason}),
        );
        self.bus.publish(&event).await?;
        Ok(())
    }

    /// Handles one `REGISTRY.VERSION_CREATED` event end to end (§4.7).
    pub async fn handle_event(&self, event: &DomainEvent) -> Result<(), CoreError> {
        let correlation_id = event.correlation_id;
        let version_id: VersionId = event
            .entity_id
            .strip_prefix("version:")
            .unwrap_or(&event.entity_id)
            .parse()
            .map_err(|_| CoreError::NotFound { what: format!("version in entity_id {}", event.entity_id) })?;

        let file_id_str = event.payload.get("file_id").and_then(|v| v.as_str()).ok_or_else(|| {
            CoreError::CanonicalizationFailed { version_id, reason: "event payload missing file_id".to_string() }
        })?;
        let file_id: FileId = file_id_str
            .strip_prefix("file:")
            .unwrap_or(file_id_str)
            .parse()
            .map_err(|_| CoreError::CanonicalizationFailed { version_id, reason: "unparseable file_id".to_string() })?;
        let raw_sha256 = event.payload.get("sha256").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        // 1. Load evidence row, fetch bytes.
        let pdf_bytes = match self.evidence.read_bytes(file_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail_version(version_id, correlation_id, &format!("evidence read failed: {e}")).await?;
                return Ok(());
            }
        };

        // 2. Extraction, bounded retry with exponential backoff (§5).
        let attempts = self.retry_attempts;
        let base_delay = self.retry_base_delay;
        let extraction = retry_bounded(attempts, base_delay, || self.extractor.extract(&pdf_bytes)).await;
        let extraction = match extraction {
            Ok(extraction) => extraction,
            Err(e) => {
                self.fail_version(version_id, correlation_id, &format!("extraction failed: {e}")).await?;
                return Ok(());
            }
        };

        // 3. Register canonical artifacts. `page_map` is the bbox-bearing
        // page list the spec's artifact shape calls for — not the bare
        // PageSpan view chunk_text consumes internally.
        let layout_map = LayoutMap { lines: &extraction.layout_lines };
        let canonical_ids = self
            .artifacts
            .store_canonical(version_id, &extraction.stable_text, &extraction.pages, &layout_map, &self.extractor_version)
            .await?;
        self.audit_version(
            version_id,
            correlation_id,
            "CANONICAL.ARTIFACTS_REGISTERED",
            serde_json::json!({
                "stable_text_id": canonical_ids.stable_text_id.to_string(),
                "page_map_id": canonical_ids.page_map_id.to_string(),
                "layout_map_id": canonical_ids.layout_map_id.to_string(),
            }),
        )
        .await?;

        // 4. Deterministic chunking.
        let page_map = extraction.page_map();
        let (spans, manifest) =
            ricc_domain::chunk_text(&extraction.stable_text, &page_map, self.chunk_max_chars, self.chunk_overlap_chars);

        // 5. Register chunk_set + retrieval_manifest.
        let chunk_set_id = self.artifacts.store_chunk_set(version_id, &manifest, &spans, &self.chunker_version).await?;
        let retrieval_manifest = serde_json::json!({
            "version_id": version_id.to_string(),
            "raw_sha256": raw_sha256,
            "canonical_artifacts": {
                "stable_text_id": canonical_ids.stable_text_id.to_string(),
                "page_map_id": canonical_ids.page_map_id.to_string(),
                "layout_map_id": canonical_ids.layout_map_id.to_string(),
            },
            "chunk_sets": [chunk_set_id.to_string()],
            "embedding_sets": [],
            "policies": {
                "citation_required": true,
                "max_context_tokens": self.retrieval_max_context_tokens,
            },
            "provenance": {
                "extractor_version": self.extractor_version,
                "layout_version": self.layout_version,
                "chunker_version": self.chunker_version,
            },
        });
        let retrieval_manifest_key = format!("indexes/{}/retrieval_manifest.json", version_id.as_uuid());
        let retrieval_manifest_id = self
            .artifacts
            .store_json_artifact(
                version_id,
                ricc_domain::ArtifactKind::RetrievalManifest,
                &retrieval_manifest,
                &retrieval_manifest_key,
                "canonicalize-worker",
                &self.chunker_version,
            )
            .await?;

        // 6. Insert chunk rows.
        self.artifacts.insert_chunks(version_id, chunk_set_id, &self.chunk_schema_version, &spans).await?;

        // 7. PENDING -> ACTIVE, artifacts_json.
        ricc_registry::set_status_pending_to_active(&self.pool, version_id).await?;
        let artifacts_json = serde_json::json!({
            "stable_text_id": canonical_ids.stable_text_id.to_string(),
            "page_map_id": canonical_ids.page_map_id.to_string(),
            "layout_map_id": canonical_ids.layout_map_id.to_string(),
            "chunk_set_id": chunk_set_id.to_string(),
            "retrieval_manifest_id": retrieval_manifest_id.to_string(),
        });
        ricc_registry::set_artifacts_json(&self.pool, version_id, artifacts_json.clone()).await?;
        self.audit_version(version_id, correlation_id, "CANONICALIZATION.COMPLETED", artifacts_json).await?;

        // 8. Emit downstream events.
        let derivation_requested = DomainEvent::new(
            EventType::LlmDerivationRequested,
            correlation_id,
            "canonicalize-worker",
            EntityType::Version,
            version_id.to_string(),
            serde_json::json!({"stable_text_artifact_id": canonical_ids.stable_text_id.to_string()}),
        );
        self.bus.publish(&derivation_requested).await?;

        let ingestion_completed = DomainEvent::new(
            EventType::IngestionCompleted,
            correlation_id,
            "canonicalize-worker",
            EntityType::Version,
            version_id.to_string(),
            serde_json::json!({"version_id": version_id.to_string()}),
        );
        self.bus.publish(&ingestion_completed).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricc_bus::InMemoryBus;
    use ricc_domain::extractor::fakes::FakeExtractor;
    use ricc_domain::{DocumentKey, PrimaryAxis, PrimaryAxisSource, VersionStatus};
    use ricc_store::LocalFsStore;

    struct Harness {
        worker: CanonicalizeWorker,
        evidence: EvidenceService,
        bus: Arc<InMemoryBus>,
        _dir: tempfile::TempDir,
    }

    async fn harness(pool: PgPool, stable_text: &str) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalFsStore::new(dir.path()).await.unwrap());
        let evidence = EvidenceService::new(pool.clone(), store.clone());
        let artifacts = ArtifactService::new(pool.clone(), store.clone(), 200);
        let audit = AuditService::new(pool.clone());
        let bus = Arc::new(InMemoryBus::default());
        let extractor = Arc::new(FakeExtractor { stable_text: stable_text.to_string() });
        let worker = CanonicalizeWorker::new(
            pool.clone(),
            EvidenceService::new(pool.clone(), store),
            artifacts,
            audit,
            bus.clone(),
            extractor,
            "extractor-v1",
            "layout-v1",
            "chunker-v1",
            "chunk_set@1.0.0",
            1500,
            0,
            8000,
            3,
            Duration::from_millis(1),
        );
        Harness { worker, evidence, bus, _dir: dir }
    }

    async fn seed_version(pool: &PgPool) -> (VersionId, ricc_core::DocumentId) {
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
        let version = ricc_registry::create_version(
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
        .unwrap();
        (version.version_id, document.document_id)
    }

    fn version_created_event(version_id: VersionId, file_id: FileId, sha256: &str, correlation_id: CorrelationId) -> DomainEvent {
        DomainEvent::new(
            EventType::RegistryVersionCreated,
            correlation_id,
            "ingest-orchestrator",
            EntityType::Version,
            version_id.to_string(),
            serde_json::json!({"file_id": file_id.to_string(), "sha256": sha256}),
        )
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn happy_path_activates_version_and_emits_events(pool: PgPool) -> sqlx::Result<()> {
        let h = harness(pool.clone(), "first paragraph.\n\nsecond paragraph.").await;
        let (version_id, document_id) = seed_version(&pool).await;
        let sha256 = "b".repeat(64);
        let evidence = h.evidence.create(&sha256, b"%PDF-1.4 body", document_id, version_id).await.unwrap();

        let mut llm_sub = h.bus.subscribe("llm-worker");
        let mut projector_sub = h.bus.subscribe("soi-projector");

        let event = version_created_event(version_id, evidence.file_id, &sha256, CorrelationId::new());
        h.worker.handle_event(&event).await.unwrap();

        let version = ricc_registry::find_version_by_id(&pool, version_id).await.unwrap().unwrap();
        assert_eq!(version.status, VersionStatus::Active);
        assert!(version.artifacts_json.is_some());

        let derivation_requested = llm_sub.recv().await.unwrap();
        assert_eq!(derivation_requested.event_type, EventType::LlmDerivationRequested);
        // The projector subscription sees both events published this call,
        // in order; the second is INGESTION.COMPLETED.
        let _first = projector_sub.recv().await.unwrap();
        let second = projector_sub.recv().await.unwrap();
        assert_eq!(second.event_type, EventType::IngestionCompleted);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn missing_evidence_fails_the_version(pool: PgPool) -> sqlx::Result<()> {
        let h = harness(pool.clone(), "irrelevant").await;
        let (version_id, _document_id) = seed_version(&pool).await;

        let mut sub = h.bus.subscribe("soi-projector");
        let event = version_created_event(version_id, FileId::new(), &"c".repeat(64), CorrelationId::new());
        h.worker.handle_event(&event).await.unwrap();

        let version = ricc_registry::find_version_by_id(&pool, version_id).await.unwrap().unwrap();
        assert_eq!(version.status, VersionStatus::Failed);

        let failed_event = sub.recv().await.unwrap();
        assert_eq!(failed_event.event_type, EventType::IngestionFailed);
        Ok(())
    }
}
