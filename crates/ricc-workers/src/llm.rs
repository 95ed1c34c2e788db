//! C11: the LLM derivation worker (§4.8).
//!
//! Consumes `LLM.DERIVATION_REQUESTED`. Every call is recorded as an
//! `llm_runs` row regardless of outcome, and a failed derivation never
//! panics the worker loop — it's recorded `FAILED` and the event is simply
//! not emitted, leaving the version `ACTIVE` (derivation is an enrichment,
//! not part of the version's own state machine).

use std::sync::Arc;

use ricc_audit::AuditService;
use ricc_artifacts::ArtifactService;
use ricc_bus::Bus;
use ricc_core::{sha256_hex, ArtifactId, CoreError, CorrelationId, VersionId};
use ricc_domain::{ArtifactKind, DomainEvent, EntityType, EventType, Llm};
use sqlx::PgPool;

use crate::llm_runs;

const DERIVATION_PROMPT_TEMPLATE: &str =
    "Summarize the regulatory obligations in the following canonical text for downstream retrieval.";

pub struct LlmWorker {
    pool: PgPool,
    artifacts: ArtifactService,
    audit: AuditService,
    bus: Arc<dyn Bus>,
    llm: Arc<dyn Llm>,
    model_version: String,
}

impl LlmWorker {
    pub fn new(
        pool: PgPool,
        artifacts: ArtifactService,
        audit: AuditService,
        bus: Arc<dyn Bus>,
        llm: Arc<dyn Llm>,
        model_version: impl Into<String>,
    ) -> Self {
        Self { pool, artifacts, audit, bus, llm, model_version: model_version.into() }
    }

    pub async fn run(&self, bus: &dyn Bus) -> Result<(), CoreError> {
        let mut sub = bus.subscribe("llm-worker");
        loop {
            let event = sub.recv().await?;
            if event.event_type != EventType::LlmDerivationRequested {
                continue;
            }
            if let Err(e) = self.handle_event(&event).await {
                tracing::error!(error = %e, entity_id = %event.entity_id, "llm worker failed to process event");
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
            .write(EntityType::Version, &version_id.to_string(), action, "llm-worker", correlation_id, details)
            .await?;
        Ok(())
    }

    /// Handles one `LLM.DERIVATION_REQUESTED` event (§4.8).
    pub async fn handle_event(&self, event: &DomainEvent) -> Result<(), CoreError> {
        let correlation_id = event.correlation_id;
        let version_id: VersionId = event
            .entity_id
            .strip_prefix("version:")
            .unwrap_or(&event.entity_id)
            .parse()
            .map_err(|_| CoreError::NotFound { what: format!("version in entity_id {}", event.entity_id) })?;

        let artifact_id_str = event.payload.get("stable_text_artifact_id").and_then(|v| v.as_str()).ok_or_else(|| {
            CoreError::LlmFailed { version_id, reason: "event payload missing stable_text_artifact_id".to_string() }
        })?;
        let stable_text_artifact_id: ArtifactId = artifact_id_str
            .strip_prefix("artifact:")
            .unwrap_or(artifact_id_str)
            .parse()
            .map_err(|_| CoreError::LlmFailed { version_id, reason: "unparseable stable_text_artifact_id".to_string() })?;

        let stable_text_bytes = self.artifacts.read_bytes(stable_text_artifact_id).await?;
        let stable_text = String::from_utf8_lossy(&stable_text_bytes).into_owned();

        let prompt_hash = sha256_hex(DERIVATION_PROMPT_TEMPLATE.as_bytes());
        let input_fingerprint =
            sha256_hex(format!("{version_id}:{prompt_hash}:{}", sha256_hex(stable_text_bytes.as_slice())).as_bytes());

        let run = llm_runs::create_pending(&self.pool, version_id, "derivation", &prompt_hash, &input_fingerprint).await?;

        let prompt = format!("{DERIVATION_PROMPT_TEMPLATE}\n\n{stable_text}");
        match self.llm.run("derivation", &prompt).await {
            Ok(output) => {
                let key = format!("derived/{}/llm_output/{}.json", version_id.as_uuid(), run.run_id.as_uuid());
                let artifact_id = self
                    .artifacts
                    .store_json_artifact(
                        version_id,
                        ArtifactKind::LlmOutput,
                        &serde_json::json!({"purpose": "derivation", "output": output}),
                        &key,
                        "llm-worker",
                        &self.model_version,
                    )
                    .await?;
                llm_runs::mark_completed(&self.pool, run.run_id, artifact_id).await?;
                self.audit_version(
                    version_id,
                    correlation_id,
                    "LLM.DERIVATION_COMPLETED",
                    serde_json::json!({"run_id": run.run_id.to_string(), "output_artifact_id": artifact_id.to_string()}),
                )
                .await?;

                let completed = DomainEvent::new(
                    EventType::LlmDerivationCompleted,
                    correlation_id,
                    "llm-worker",
                    EntityType::Version,
                    version_id.to_string(),
                    serde_json::json!({"run_id": run.run_id.to_string(), "output_artifact_id": artifact_id.to_string()}),
                );
                self.bus.publish(&completed).await?;
            }
            Err(e) => {
                llm_runs::mark_failed(&self.pool, run.run_id).await?;
                self.audit_version(
                    version_id,
                    correlation_id,
                    "LLM.DERIVATION_FAILED",
                    serde_json::json!({"run_id": run.run_id.to_string(), "reason": e.to_string()}),
                )
                .await?;
                tracing::warn!(error = %e, version_id = %version_id, "llm derivation failed");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricc_bus::InMemoryBus;
    use ricc_domain::llm::fakes::{FailingLlm, FakeLlm};
    use ricc_domain::{DocumentKey, PrimaryAxis, PrimaryAxisSource, VersionStatus};
    use ricc_store::LocalFsStore;
    use std::sync::Arc as StdArc;

    struct Harness {
        worker: LlmWorker,
        artifacts: ArtifactService,
        bus: StdArc<InMemoryBus>,
        _dir: tempfile::TempDir,
    }

    async fn harness(pool: PgPool, llm: Arc<dyn Llm>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = StdArc::new(LocalFsStore::new(dir.path()).await.unwrap());
        let artifacts = ArtifactService::new(pool.clone(), store, 200);
        let audit = AuditService::new(pool.clone());
        let bus = StdArc::new(InMemoryBus::default());
        let worker = LlmWorker::new(pool.clone(), ArtifactService::new(pool, StdArc::new(LocalFsStore::new(dir.path()).await.unwrap()), 200), audit, bus.clone(), llm, "0");
        Harness { worker, artifacts, bus, _dir: dir }
    }

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
        ricc_registry::set_status_pending_to_active(pool, version.version_id).await.unwrap();
        version.version_id
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn successful_derivation_registers_artifact_and_completes_run(pool: PgPool) -> sqlx::Result<()> {
        let llm: Arc<dyn Llm> = Arc::new(FakeLlm { response: "concise summary".to_string() });
        let h = harness(pool.clone(), llm).await;
        let version_id = seed_version(&pool).await;
        let stable_text_id = h
            .artifacts
            .store_canonical(version_id, "obligations text", &serde_json::json!([]), &serde_json::json!({"lines": []}), "extractor-v1")
            .await
            .unwrap()
            .stable_text_id;

        let mut sub = h.bus.subscribe("soi-projector");
        let event = DomainEvent::new(
            EventType::LlmDerivationRequested,
            CorrelationId::new(),
            "canonicalize-worker",
            EntityType::Version,
            version_id.to_string(),
            serde_json::json!({"stable_text_artifact_id": stable_text_id.to_string()}),
        );
        h.worker.handle_event(&event).await.unwrap();

        let completed = sub.recv().await.unwrap();
        assert_eq!(completed.event_type, EventType::LlmDerivationCompleted);

        let version = ricc_registry::find_version_by_id(&pool, version_id).await.unwrap().unwrap();
        assert_eq!(version.status, VersionStatus::Active);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn failing_llm_records_failed_run_without_emitting_completed(pool: PgPool) -> sqlx::Result<()> {
        let llm: Arc<dyn Llm> = Arc::new(FailingLlm);
        let h = harness(pool.clone(), llm).await;
        let version_id = seed_version(&pool).await;
        let stable_text_id = h
            .artifacts
            .store_canonical(version_id, "obligations text", &serde_json::json!([]), &serde_json::json!({"lines": []}), "extractor-v1")
            .await
            .unwrap()
            .stable_text_id;

        let event = DomainEvent::new(
            EventType::LlmDerivationRequested,
            CorrelationId::new(),
            "canonicalize-worker",
            EntityType::Version,
            version_id.to_string(),
            serde_json::json!({"stable_text_artifact_id": stable_text_id.to_string()}),
        );
        h.worker.handle_event(&event).await.unwrap();

        let version = ricc_registry::find_version_by_id(&pool, version_id).await.unwrap().unwrap();
        assert_eq!(version.status, VersionStatus::Active, "derivation failure must not touch the version state machine");
        Ok(())
    }
}
