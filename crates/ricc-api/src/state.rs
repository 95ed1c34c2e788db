//! Shared application state, built once at process startup and handed to
//! every handler via axum's `State` extractor.
//!
//! Mirrors the "global process state" design note (§9): `config` is a
//! frozen snapshot, the database pool and bus handle are long-lived and
//! shared, and every service here is the same instance the workers use —
//! `ricc-cli`'s `serve` and worker subcommands construct these from the
//! same `Config`, so a lookup through the API always sees what a worker
//! just wrote.

use std::sync::Arc;

use ricc_artifacts::ArtifactService;
use ricc_audit::AuditService;
use ricc_bus::Bus;
use ricc_core::Config;
use ricc_evidence::EvidenceService;
use ricc_ingest::IngestOrchestrator;
use ricc_store::ObjectStore;
use sqlx::PgPool;

/// Application state shared across every route handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub orchestrator: Arc<IngestOrchestrator>,
    pub evidence: Arc<EvidenceService>,
    pub artifacts: Arc<ArtifactService>,
    pub audit: Arc<AuditService>,
    pub bus: Arc<dyn Bus>,
    pub store: Arc<dyn ObjectStore>,
}
