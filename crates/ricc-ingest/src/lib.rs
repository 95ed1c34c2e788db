//! `ricc-ingest` — C9: the ingestion orchestrator (§4.6).
//!
//! Owns no rows of its own: every write goes through `ricc-registry`,
//! `ricc-evidence`, `ricc-audit`, or `ricc-bus`. This crate's only job is
//! sequencing those calls in the exact order §4.6 specifies, so dedupe,
//! the version-chain state machine, and the truth/suggestion boundary stay
//! consistent regardless of which HTTP handler or CLI subcommand drives it.

use std::sync::Arc;

use ricc_audit::AuditService;
use ricc_bus::Bus;
use ricc_core::{sha256_hex, CoreError, CorrelationId, DocumentId, FileId, VersionId};
use ricc_domain::{
    DomainEvent, EntityType, EventType, Llm, PrimaryAxis, PrimaryAxisSource, UploadFields,
    UploadRules,
};
use ricc_evidence::EvidenceService;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Inputs to a single ingestion call (§4.6, §6's multipart upload fields).
pub struct IngestRequest<'a> {
    pub bytes: &'a [u8],
    pub title: Option<&'a str>,
    pub jurisdiction: Option<&'a str>,
    pub regulation_family: Option<&'a str>,
    pub instrument_type: Option<&'a str>,
    pub tenant_id: Option<&'a str>,
    pub effective_year: Option<i32>,
    pub primary_axis: Option<&'a str>,
    pub version_label: Option<&'a str>,
    pub effective_date: Option<chrono::NaiveDate>,
    pub parent_version_id: Option<VersionId>,
    pub actor: &'a str,
    pub force_new_version: bool,
}

/// §4.6 step 13's three "created" outcomes, plus the dedupe shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionStatus {
    DedupReturnExisting,
    CreatedNewDocumentAndVersion,
    CreatedNewVersion,
    CreatedNewVersionReusedFile,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub http_status: u16,
    pub ingestion_status: IngestionStatus,
    pub correlation_id: CorrelationId,
    pub document_id: DocumentId,
    pub version_id: VersionId,
    pub file_id: FileId,
    pub sha256: String,
    pub primary_axis_source: PrimaryAxisSource,
}

/// A suggester call result, kept separate from [`ricc_domain::Llm`] itself so
/// the orchestrator's parsing convention for the suggester's raw text output
/// lives here rather than in the generic capability trait.
struct SuggestionResult {
    suggested_axis: PrimaryAxis,
    confidence: f64,
    details: serde_json::Value,
}

#[derive(Deserialize)]
struct RawSuggestionOutput {
    suggested_axis: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

pub struct IngestOrchestrator {
    pool: PgPool,
    evidence: EvidenceService,
    audit: AuditService,
    bus: Arc<dyn Bus>,
    llm: Option<Arc<dyn Llm>>,
    enable_llm_primary_axis_suggestion: bool,
    llm_model_name: String,
    llm_model_version: String,
}

impl IngestOrchestrator {
    pub fn new(
        pool: PgPool,
        evidence: EvidenceService,
        audit: AuditService,
        bus: Arc<dyn Bus>,
        llm: Option<Arc<dyn Llm>>,
        enable_llm_primary_axis_suggestion: bool,
        llm_model_name: impl Into<String>,
        llm_model_version: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            evidence,
            audit,
            bus,
            llm,
            enable_llm_primary_axis_suggestion,
            llm_model_name: llm_model_name.into(),
            llm_model_version: llm_model_version.into(),
        }
    }

    async fn audit_system(
        &self,
        correlation_id: CorrelationId,
        action: &str,
        actor: &str,
        details: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.audit
            .write(EntityType::System, &correlation_id.to_string(), action, actor, correlation_id, details)
            .await?;
        Ok(())
    }

    async fn audit_version(
        &self,
        version_id: VersionId,
        correlation_id: CorrelationId,
        action: &str,
        actor: &str,
        details: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.audit
            .write(EntityType::Version, &version_id.to_string(), action, actor, correlation_id, details)
            .await?;
        Ok(())
    }

    /// Runs the full §4.6 algorithm for one upload.
    pub async fn ingest(&self, req: IngestRequest<'_>) -> Result<IngestOutcome, CoreError> {
        // 1. Fresh correlation id, request-received audit. No entity exists
        // yet, so this and the next two audits key off the correlation id
        // itself via EntityType::System.
        let correlation_id = CorrelationId::new();
        self.audit_system(correlation_id, "REQUEST.RECEIVED", req.actor, serde_json::json!({})).await?;

        // 2. Rules + size enforcement.
        let rules = ricc_registry::load_active_rules(&self.pool).await?;
        let fields = UploadFields {
            title: req.title,
            jurisdiction: req.jurisdiction,
            regulation_family: req.regulation_family,
            instrument_type: req.instrument_type,
            tenant_id: req.tenant_id,
            effective_year: req.effective_year,
            primary_axis: req.primary_axis,
        };
        ricc_domain::enforce_upload_rules(&rules, &fields)?;
        enforce_payload_size(&rules, req.bytes)?;

        // 3. Fingerprint.
        let sha256 = sha256_hex(req.bytes);
        self.audit_system(
            correlation_id,
            "FINGERPRINT.COMPUTED",
            req.actor,
            serde_json::json!({"sha256": sha256}),
        )
        .await?;
        self.audit_system(correlation_id, "DEDUP.CHECKED", req.actor, serde_json::json!({"sha256": sha256})).await?;

        let key = ricc_domain::DocumentKey {
            title: req.title.unwrap_or_default().to_string(),
            jurisdiction: req.jurisdiction.unwrap_or_default().to_string(),
            regulation_family: req.regulation_family.unwrap_or_default().to_string(),
            instrument_type: req.instrument_type.unwrap_or_default().to_string(),
        };

        // 4. Dedupe shortcut. §4.6 step 4: "find any evidence row with
        // `sha`, then any version on that file whose parent document has
        // identical metadata" — the same bytes can live under more than one
        // `file_id` across documents (§9's typo-fix tie-break), so every
        // evidence row sharing the sha must be checked, not just the most
        // recent one.
        let mut dedupe_candidate = None;
        for existing_evidence in self.evidence.find_all_by_sha(&sha256).await? {
            if let Some(existing_version) =
                ricc_registry::find_dedupe_candidate(&self.pool, existing_evidence.file_id, &key).await?
            {
                dedupe_candidate = Some((existing_evidence, existing_version));
                break;
            }
        }
        if let Some((existing_evidence, existing_version)) = dedupe_candidate {
            if !req.force_new_version {
                self.audit_version(
                    existing_version.version_id,
                    correlation_id,
                    "DEDUP.SHORTCIRCUIT_RETURNED",
                    req.actor,
                    serde_json::json!({"sha256": sha256}),
                )
                .await?;
                let document = ricc_registry::find_document_by_id(&self.pool, existing_version.document_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound { what: format!("document {}", existing_version.document_id) })?;
                return Ok(IngestOutcome {
                    http_status: 200,
                    ingestion_status: IngestionStatus::DedupReturnExisting,
                    correlation_id,
                    document_id: document.document_id,
                    version_id: existing_version.version_id,
                    file_id: existing_evidence.file_id,
                    sha256,
                    primary_axis_source: document.primary_axis_source,
                });
            }
        }

        // 5. Resolve truth primary_axis.
        let (primary_axis, primary_axis_source) = resolve_primary_axis(&req)?;

        // 6. Find-or-create document, with DUPLICATE_KEY race recovery.
        let existing = ricc_registry::find_document_by_metadata(&self.pool, &key).await?;
        let (document_id, document_created, stored_source) = match existing {
            Some(doc) => {
                if doc.primary_axis != primary_axis {
                    return Err(CoreError::PrimaryAxisMismatch {
                        document_id: doc.document_id,
                        stored: doc.primary_axis.to_string(),
                        attempted: primary_axis.to_string(),
                    });
                }
                (doc.document_id, false, doc.primary_axis_source)
            }
            None => {
                match ricc_registry::create_document(&self.pool, &key, primary_axis, primary_axis_source).await {
                    Ok(doc) => (doc.document_id, true, doc.primary_axis_source),
                    Err(e) if e.is_duplicate_key() => {
                        let doc = ricc_registry::find_document_by_metadata(&self.pool, &key)
                            .await?
                            .ok_or(e)?;
                        if doc.primary_axis != primary_axis {
                            return Err(CoreError::PrimaryAxisMismatch {
                                document_id: doc.document_id,
                                stored: doc.primary_axis.to_string(),
                                attempted: primary_axis.to_string(),
                            });
                        }
                        (doc.document_id, false, doc.primary_axis_source)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        // 7. Create version (validates parent_version_id internally).
        let version = ricc_registry::create_version(
            &self.pool,
            ricc_registry::NewVersion {
                document_id,
                version_label: req.version_label.map(str::to_string),
                effective_date: req.effective_date,
                parent_version_id: req.parent_version_id,
                tenant_id: req.tenant_id.unwrap_or_default().to_string(),
                effective_year: req.effective_year.unwrap_or_default(),
                uploaded_by: req.actor.to_string(),
                raw_sha256: sha256.clone(),
            },
        )
        .await?;

        // 8. Evidence reuse-or-create. Reuse only applies when the caller
        // explicitly asked for a new version over already-seen bytes
        // (force_new_version); every other path — including the tie-break
        // where matching bytes arrive under different document metadata —
        // writes a fresh evidence row (§4.6 "tie-breaks").
        let reused_evidence = if req.force_new_version {
            self.evidence.find_by_sha(&sha256).await?
        } else {
            None
        };
        let (file_id, reused_file) = match reused_evidence {
            Some(ev) => (ev.file_id, true),
            None => {
                let created = self.evidence.create(&sha256, req.bytes, document_id, version.version_id).await?;
                (created.file_id, false)
            }
        };
        ricc_registry::set_version_file_id(&self.pool, version.version_id, file_id).await?;

        // 9. Supersede the parent, if any.
        if let Some(parent_id) = req.parent_version_id {
            let transitioned = ricc_registry::mark_parent_superseded(&self.pool, parent_id).await?;
            self.audit_version(
                parent_id,
                correlation_id,
                "PARENT_VERSION_SUPERSEDED",
                req.actor,
                serde_json::json!({"transitioned": transitioned, "superseded_by": version.version_id.to_string()}),
            )
            .await?;
        }

        // 10. Version-created audit.
        self.audit_version(
            version.version_id,
            correlation_id,
            "REGISTRY.VERSION_CREATED",
            req.actor,
            serde_json::json!({
                "document_id": document_id.to_string(),
                "file_id": file_id.to_string(),
                "sha256": sha256,
            }),
        )
        .await?;

        // 11. Optional LLM primary-axis suggestion. Never touches
        // documents.primary_axis.
        if self.enable_llm_primary_axis_suggestion {
            if let Some(llm) = &self.llm {
                match self.suggest_primary_axis(llm.as_ref(), &key).await {
                    Ok(suggestion) => {
                        ricc_registry::upsert_primary_axis_suggestion(
                            &self.pool,
                            version.version_id,
                            suggestion.suggested_axis,
                            &self.llm_model_name,
                            &self.llm_model_version,
                            suggestion.confidence,
                            suggestion.details.clone(),
                        )
                        .await?;
                        self.audit_version(
                            version.version_id,
                            correlation_id,
                            "LLM.PRIMARY_AXIS_SUGGESTED",
                            "llm-suggester",
                            serde_json::json!({
                                "suggested_axis": suggestion.suggested_axis.as_str(),
                                "confidence": suggestion.confidence,
                            }),
                        )
                        .await?;
                    }
                    Err(e) => {
                        // The suggestion is advisory; a failure here must
                        // not fail the ingestion itself.
                        tracing::warn!(error = %e, version_id = %version.version_id, "primary-axis suggestion failed");
                    }
                }
            }
        }

        // 12. Emit on the bus.
        let event = DomainEvent::new(
            EventType::RegistryVersionCreated,
            correlation_id,
            req.actor,
            EntityType::Version,
            version.version_id.to_string(),
            serde_json::json!({
                "document_id": document_id.to_string(),
                "version_id": version.version_id.to_string(),
                "file_id": file_id.to_string(),
                "sha256": sha256,
            }),
        );
        self.bus.publish(&event).await?;

        // 13. Return.
        let ingestion_status = if document_created {
            IngestionStatus::CreatedNewDocumentAndVersion
        } else if reused_file {
            IngestionStatus::CreatedNewVersionReusedFile
        } else {
            IngestionStatus::CreatedNewVersion
        };

        Ok(IngestOutcome {
            http_status: 201,
            ingestion_status,
            correlation_id,
            document_id,
            version_id: version.version_id,
            file_id,
            sha256,
            primary_axis_source: stored_source,
        })
    }

    async fn suggest_primary_axis(
        &self,
        llm: &dyn Llm,
        key: &ricc_domain::DocumentKey,
    ) -> Result<SuggestionResult, CoreError> {
        let prompt = format!(
            "Classify the primary regulatory axis (jurisdiction, product_scope, or theme) for: \
             title={:?} jurisdiction={:?} regulation_family={:?} instrument_type={:?}",
            key.title, key.jurisdiction, key.regulation_family, key.instrument_type
        );
        let raw = llm.run("primary_axis_suggestion", &prompt).await?;
        let parsed: RawSuggestionOutput = serde_json::from_str(&raw)
            .map_err(ricc_core::CanonicalizationError::from)?;
        let suggested_axis: PrimaryAxis = parsed
            .suggested_axis
            .parse()
            .map_err(|_| CoreError::InvalidPrimaryAxis { value: parsed.suggested_axis.clone() })?;
        Ok(SuggestionResult {
            suggested_axis,
            confidence: parsed.confidence,
            details: serde_json::json!({"reasoning": parsed.reasoning}),
        })
    }
}

fn enforce_payload_size(rules: &UploadRules, bytes: &[u8]) -> Result<(), CoreError> {
    let max_bytes = rules.max_pdf_mb as usize * 1024 * 1024;
    if bytes.len() > max_bytes {
        Err(CoreError::PayloadTooLarge { max_mb: rules.max_pdf_mb, actual_bytes: bytes.len() })
    } else {
        Ok(())
    }
}

fn resolve_primary_axis(req: &IngestRequest<'_>) -> Result<(PrimaryAxis, PrimaryAxisSource), CoreError> {
    match req.primary_axis.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => {
            let axis: PrimaryAxis =
                value.parse().map_err(|_| CoreError::InvalidPrimaryAxis { value: value.to_string() })?;
            Ok((axis, PrimaryAxisSource::Upload))
        }
        None => {
            let axis = ricc_domain::derive_primary_axis(req.jurisdiction, req.title, req.regulation_family, req.instrument_type);
            Ok((axis, PrimaryAxisSource::DeterministicRule))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricc_bus::InMemoryBus;
    use ricc_domain::llm::fakes::FakeLlm;
    use ricc_store::LocalFsStore;

    async fn orchestrator(pool: PgPool, llm_enabled: bool) -> (IngestOrchestrator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path()).await.unwrap();
        let evidence = EvidenceService::new(pool.clone(), Arc::new(store));
        let audit = AuditService::new(pool.clone());
        let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::default());
        let llm: Option<Arc<dyn Llm>> =
            if llm_enabled { Some(Arc::new(FakeLlm { response: r#"{"suggested_axis":"theme","confidence":0.5,"reasoning":"x"}"#.to_string() })) } else { None };
        (IngestOrchestrator::new(pool, evidence, audit, bus, llm, llm_enabled, "stub-llm", "0"), dir)
    }

    fn base_request(bytes: &[u8]) -> IngestRequest<'_> {
        IngestRequest {
            bytes,
            title: Some("EU CBAM"),
            jurisdiction: Some("EU"),
            regulation_family: Some("carbon"),
            instrument_type: Some("regulation"),
            tenant_id: Some("t1"),
            effective_year: Some(2026),
            primary_axis: None,
            version_label: None,
            effective_date: None,
            parent_version_id: None,
            actor: "uploader@example.com",
            force_new_version: false,
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn first_upload_creates_document_and_version(pool: PgPool) -> sqlx::Result<()> {
        let (orch, _dir) = orchestrator(pool, false).await;
        let bytes = b"%PDF-1.4 first upload";
        let outcome = orch.ingest(base_request(bytes)).await.unwrap();
        assert_eq!(outcome.http_status, 201);
        assert_eq!(outcome.ingestion_status, IngestionStatus::CreatedNewDocumentAndVersion);
        assert_eq!(outcome.primary_axis_source, PrimaryAxisSource::DeterministicRule);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn identical_reupload_short_circuits(pool: PgPool) -> sqlx::Result<()> {
        let (orch, _dir) = orchestrator(pool, false).await;
        let bytes = b"%PDF-1.4 identical content";
        let first = orch.ingest(base_request(bytes)).await.unwrap();
        let second = orch.ingest(base_request(bytes)).await.unwrap();

        assert_eq!(second.http_status, 200);
        assert_eq!(second.ingestion_status, IngestionStatus::DedupReturnExisting);
        assert_eq!(second.version_id, first.version_id);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn force_new_version_reuses_file(pool: PgPool) -> sqlx::Result<()> {
        let (orch, _dir) = orchestrator(pool, false).await;
        let bytes = b"%PDF-1.4 reuse me";
        let first = orch.ingest(base_request(bytes)).await.unwrap();

        let mut req = base_request(bytes);
        req.force_new_version = true;
        let second = orch.ingest(req).await.unwrap();

        assert_eq!(second.ingestion_status, IngestionStatus::CreatedNewVersionReusedFile);
        assert_eq!(second.file_id, first.file_id);
        assert_ne!(second.version_id, first.version_id);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn dedupe_survives_a_newer_evidence_row_under_another_document(pool: PgPool) -> sqlx::Result<()> {
        // §9's typo-fix tie-break: identical bytes land under two documents,
        // each with their own evidence row. A re-upload matching the first
        // document's metadata must still short-circuit against that
        // document's version even though the second document's evidence row
        // is the most recent one with that sha.
        let (orch, _dir) = orchestrator(pool, false).await;
        let bytes = b"%PDF-1.4 shared bytes, different metadata";

        let first = orch.ingest(base_request(bytes)).await.unwrap();

        let mut typo_fixed = base_request(bytes);
        typo_fixed.title = Some("EU CBAM (corrected)");
        let second = orch.ingest(typo_fixed).await.unwrap();
        assert_ne!(second.document_id, first.document_id);
        assert_ne!(second.file_id, first.file_id);

        let reupload = orch.ingest(base_request(bytes)).await.unwrap();
        assert_eq!(reupload.http_status, 200);
        assert_eq!(reupload.ingestion_status, IngestionStatus::DedupReturnExisting);
        assert_eq!(reupload.document_id, first.document_id);
        assert_eq!(reupload.version_id, first.version_id);
        assert_eq!(reupload.file_id, first.file_id);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn conflicting_primary_axis_is_rejected(pool: PgPool) -> sqlx::Result<()> {
        let (orch, _dir) = orchestrator(pool, false).await;
        orch.ingest(base_request(b"%PDF-1.4 v1")).await.unwrap();

        let mut second = base_request(b"%PDF-1.4 v2, different bytes");
        second.primary_axis = Some("theme");
        let err = orch.ingest(second).await.unwrap_err();
        assert!(matches!(err, CoreError::PrimaryAxisMismatch { .. }));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn oversized_payload_is_rejected(pool: PgPool) -> sqlx::Result<()> {
        let (orch, _dir) = orchestrator(pool, false).await;
        ricc_registry::set_active_rules(
            &orch.pool,
            &UploadRules { max_pdf_mb: 0, ..UploadRules::default() },
        )
        .await
        .unwrap();

        let err = orch.ingest(base_request(b"too big for a zero mb limit")).await.unwrap_err();
        assert!(matches!(err, CoreError::PayloadTooLarge { .. }));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn llm_suggestion_is_recorded_without_overwriting_truth(pool: PgPool) -> sqlx::Result<()> {
        let (orch, _dir) = orchestrator(pool, true).await;
        let outcome = orch.ingest(base_request(b"%PDF-1.4 suggestion case")).await.unwrap();

        let suggestion = ricc_registry::find_suggestion_by_version(&orch.pool, outcome.version_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(suggestion.suggested_axis, PrimaryAxis::Theme);

        let document = ricc_registry::find_document_by_id(&orch.pool, outcome.document_id).await.unwrap().unwrap();
        assert_eq!(document.primary_axis, PrimaryAxis::Jurisdiction);
        Ok(())
    }
}
