//! Shared bootstrap for every `ricc` subcommand (§10's "global process
//! state"): one frozen [`Config`], one `PgPool`, one object store, one
//! in-process bus. `serve` and the worker subcommands are separate
//! processes in a real deployment — each gets its own [`InMemoryBus`], so a
//! version created by an API process is only canonicalized if
//! `canonicalize-worker` runs in that same process (§9's design note on the
//! bus being in-process rather than a real broker is the deliberate
//! simplification this crate lives with).

use std::sync::Arc;

use ricc_artifacts::ArtifactService;
use ricc_audit::AuditService;
use ricc_bus::{Bus, InMemoryBus};
use ricc_core::{Config, StorageMode};
use ricc_evidence::EvidenceService;
use ricc_store::{LocalFsStore, ObjectStore, S3Store};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub struct Bootstrap {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub store: Arc<dyn ObjectStore>,
    pub bus: Arc<dyn Bus>,
}

pub async fn bootstrap() -> anyhow::Result<Bootstrap> {
    let config = Arc::new(Config::from_env()?);

    let pool = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;

    let store: Arc<dyn ObjectStore> = match config.storage_mode {
        StorageMode::Local => Arc::new(LocalFsStore::new(&config.storage_root).await?),
        StorageMode::S3 => Arc::new(S3Store::from_config(&config)?),
    };

    let bus: Arc<dyn Bus> = Arc::new(InMemoryBus::default());

    Ok(Bootstrap { config, pool, store, bus })
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();
}

pub fn evidence_service(boot: &Bootstrap) -> EvidenceService {
    EvidenceService::new(boot.pool.clone(), boot.store.clone())
}

pub fn artifact_service(boot: &Bootstrap) -> ArtifactService {
    ArtifactService::new(boot.pool.clone(), boot.store.clone(), boot.config.char_artifact_max_pages as usize)
}

pub fn audit_service(boot: &Bootstrap) -> AuditService {
    AuditService::new(boot.pool.clone())
}
