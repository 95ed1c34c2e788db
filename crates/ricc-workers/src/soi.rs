//! C12: the SoI projector (§4.9).
//!
//! Maintains `soi_documents` and `soi_versions`, the denormalized read
//! model behind the Lookup APIs. Every upsert re-fetches the authoritative
//! row from the registry rather than trusting the event payload, so
//! out-of-order or duplicate delivery (§5: at-least-once) just re-derives
//! the same row twice.

use std::sync::Arc;

use ricc_artifacts::ArtifactService;
use ricc_bus::Bus;
use ricc_core::{CoreError, DocumentId, Timestamp, VersionId};
use ricc_domain::{DomainEvent, EventType};
use sqlx::PgPool;

/// Upserts `soi_documents` from the current authoritative document row, plus
/// its latest version's id/status if one exists.
pub async fn upsert_document(
    pool: &PgPool,
    document_id: DocumentId,
    latest_version_id: Option<VersionId>,
    latest_version_status: Option<&str>,
) -> Result<(), CoreError> {
    let document = ricc_registry::find_document_by_id(pool, document_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { what: format!("document {document_id}") })?;
    let now = Timestamp::now();
    sqlx::query(
        "INSERT INTO soi_documents \
         (document_id, title, jurisdiction, regulation_family, instrument_type, primary_axis, primary_axis_source, \
          latest_version_id, latest_version_status, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (document_id) DO UPDATE SET \
           title = EXCLUDED.title, jurisdiction = EXCLUDED.jurisdiction, \
           regulation_family = EXCLUDED.regulation_family, instrument_type = EXCLUDED.instrument_type, \
           primary_axis = EXCLUDED.primary_axis, primary_axis_source = EXCLUDED.primary_axis_source, \
           latest_version_id = EXCLUDED.latest_version_id, latest_version_status = EXCLUDED.latest_version_status, \
           updated_at = EXCLUDED.updated_at",
    )
    .bind(document.document_id.0)
    .bind(&document.title)
    .bind(&document.jurisdiction)
    .bind(&document.regulation_family)
    .bind(&document.instrument_type)
    .bind(document.primary_axis.as_str())
    .bind(document.primary_axis_source.as_str())
    .bind(latest_version_id.map(|v| v.0))
    .bind(latest_version_status)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;
    Ok(())
}

/// Upserts `soi_versions` from the current authoritative version row.
/// `artifact_count` is passed in explicitly rather than recounted here —
/// callers only recount on `INGESTION.COMPLETED` (§4.9).
pub async fn upsert_version(pool: &PgPool, version_id: VersionId, artifact_count: i64) -> Result<(), CoreError> {
    let version = ricc_registry::find_version_by_id(pool, version_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { what: format!("version {version_id}") })?;
    let now = Timestamp::now();
    sqlx::query(
        "INSERT INTO soi_versions (version_id, document_id, status, artifact_count, updated_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (version_id) DO UPDATE SET \
           document_id = EXCLUDED.document_id, status = EXCLUDED.status, \
           artifact_count = EXCLUDED.artifact_count, updated_at = EXCLUDED.updated_at",
    )
    .bind(version.version_id.0)
    .bind(version.document_id.0)
    .bind(version.status.as_str())
    .bind(artifact_count)
    .bind(now.as_datetime())
    .execute(pool)
    .await?;
    Ok(())
}

pub struct SoiProjector {
    pool: PgPool,
    artifacts: ArtifactService,
}

impl SoiProjector {
    pub fn new(pool: PgPool, artifacts: ArtifactService) -> Self {
        Self { pool, artifacts }
    }

    pub async fn run(&self, bus: &dyn Bus) -> Result<(), CoreError> {
        let mut sub = bus.subscribe("soi-projector");
        loop {
            let event = sub.recv().await?;
            let relevant = matches!(
                event.event_type,
                EventType::RegistryVersionCreated | EventType::IngestionCompleted | EventType::IngestionFailed
            );
            if !relevant {
                continue;
            }
            if let Err(e) = self.handle_event(&event).await {
                tracing::error!(error = %e, entity_id = %event.entity_id, "soi projector failed to process event");
            }
        }
    }

    /// Handles one of the three events the projector cares about (§4.9).
    pub async fn handle_event(&self, event: &DomainEvent) -> Result<(), CoreError> {
        let version_id: VersionId = event
            .entity_id
            .strip_prefix("version:")
            .unwrap_or(&event.entity_id)
            .parse()
            .map_err(|_| CoreError::NotFound { what: format!("version in entity_id {}", event.entity_id) })?;

        let version = ricc_registry::find_version_by_id(&self.pool, version_id)
            .await?
            .ok_or_else(|| CoreError::NotFound { what: format!("version {version_id}") })?;

        let artifact_count = if event.event_type == EventType::IngestionCompleted {
            self.artifacts.count_for_version(version_id).await?
        } else {
            0
        };
        upsert_version(&self.pool, version_id, artifact_count).await?;
        upsert_document(&self.pool, version.document_id, Some(version_id), Some(version.status.as_str())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricc_domain::{DocumentKey, PrimaryAxis, PrimaryAxisSource, VersionStatus};
    use ricc_store::LocalFsStore;
    use std::sync::Arc as StdArc;

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
        ricc_registry::create_version(
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
        .unwrap()
        .version_id
    }

    async fn projector(pool: PgPool) -> (SoiProjector, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = StdArc::new(LocalFsStore::new(dir.path()).await.unwrap());
        let artifacts = ArtifactService::new(pool.clone(), store, 200);
        (SoiProjector::new(pool, artifacts), dir)
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn version_created_projects_pending_rows(pool: PgPool) -> sqlx::Result<()> {
        let version_id = seed_version(&pool).await;
        let (p, _dir) = projector(pool.clone()).await;

        let event = DomainEvent::new(
            EventType::RegistryVersionCreated,
            ricc_core::CorrelationId::new(),
            "ingest-orchestrator",
            ricc_domain::EntityType::Version,
            version_id.to_string(),
            serde_json::json!({}),
        );
        p.handle_event(&event).await.unwrap();

        let row: (String, i32) = sqlx::query_as("SELECT status, artifact_count FROM soi_versions WHERE version_id = $1")
            .bind(version_id.0)
            .fetch_one(&pool)
            .await?;
        assert_eq!(row.0, VersionStatus::Pending.as_str());
        assert_eq!(row.1, 0);

        let doc_row: (Option<uuid::Uuid>, Option<String>) =
            sqlx::query_as("SELECT latest_version_id, latest_version_status FROM soi_documents WHERE document_id = (SELECT document_id FROM document_versions WHERE version_id = $1)")
                .bind(version_id.0)
                .fetch_one(&pool)
                .await?;
        assert_eq!(doc_row.0, Some(version_id.0));
        assert_eq!(doc_row.1.as_deref(), Some("PENDING"));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn redelivery_of_the_same_event_is_idempotent(pool: PgPool) -> sqlx::Result<()> {
        let version_id = seed_version(&pool).await;
        let (p, _dir) = projector(pool.clone()).await;

        let event = DomainEvent::new(
            EventType::RegistryVersionCreated,
            ricc_core::CorrelationId::new(),
            "ingest-orchestrator",
            ricc_domain::EntityType::Version,
            version_id.to_string(),
            serde_json::json!({}),
        );
        p.handle_event(&event).await.unwrap();
        p.handle_event(&event).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM soi_versions WHERE version_id = $1")
            .bind(version_id.0)
            .fetch_one(&pool)
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn ingestion_completed_recounts_artifacts(pool: PgPool) -> sqlx::Result<()> {
        let version_id = seed_version(&pool).await;
        let (p, _dir) = projector(pool.clone()).await;
        p.artifacts
            .register(version_id, ricc_domain::ArtifactKind::StableText, b"hello", "k1", "text/plain", "test", "v1")
            .await
            .unwrap();
        ricc_registry::set_status_pending_to_active(&pool, version_id).await.unwrap();

        let event = DomainEvent::new(
            EventType::IngestionCompleted,
            ricc_core::CorrelationId::new(),
            "canonicalize-worker",
            ricc_domain::EntityType::Version,
            version_id.to_string(),
            serde_json::json!({}),
        );
        p.handle_event(&event).await.unwrap();

        let artifact_count: i32 = sqlx::query_scalar("SELECT artifact_count FROM soi_versions WHERE version_id = $1")
            .bind(version_id.0)
            .fetch_one(&pool)
            .await?;
        assert_eq!(artifact_count, 1);
        Ok(())
    }
}
