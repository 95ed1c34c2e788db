//! `ricc` — operator commands for the ingestion core (§6, §13's C17).
//!
//! Each worker subcommand runs the corresponding consumer's `run` loop
//! forever against this process's own in-process bus; `serve` runs the
//! HTTP surface. A real deployment runs `serve` and the three worker
//! subcommands as separate processes, each subscribed to the same
//! broker-backed bus in place of [`ricc_bus::InMemoryBus`] (§9's noted
//! simplification).

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ricc_workers::{CanonicalizeWorker, LlmWorker, PlainTextExtractor, SoiProjector, StubLlm};

#[derive(Parser, Debug)]
#[command(name = "ricc", version, about = "Regulation ingestion and canonicalization core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API (upload, lookup, and audit routes).
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run the canonicalization worker (extraction, chunking, artifact registration).
    CanonicalizeWorker,
    /// Run the LLM derivation worker.
    LlmWorker,
    /// Run the System-of-Insight projector.
    SoiProjector,
    /// Recompute every audit chain and report the number of broken links.
    VerifyAudit,
}

#[tokio::main]
async fn main() -> ExitCode {
    ricc_cli::init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port } => serve(port).await,
        Commands::CanonicalizeWorker => canonicalize_worker().await,
        Commands::LlmWorker => llm_worker().await,
        Commands::SoiProjector => soi_projector().await,
        Commands::VerifyAudit => verify_audit().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ricc exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn serve(port: u16) -> anyhow::Result<()> {
    let boot = ricc_cli::bootstrap().await?;

    let llm: Option<Arc<dyn ricc_domain::Llm>> =
        if boot.config.enable_llm_primary_axis_suggestion { Some(Arc::new(StubLlm)) } else { None };

    let orchestrator = Arc::new(ricc_ingest::IngestOrchestrator::new(
        boot.pool.clone(),
        ricc_cli::evidence_service(&boot),
        ricc_cli::audit_service(&boot),
        boot.bus.clone(),
        llm,
        boot.config.enable_llm_primary_axis_suggestion,
        boot.config.llm_model_name.clone(),
        boot.config.llm_model_version.clone(),
    ));

    let state = ricc_api::state::AppState {
        config: boot.config.clone(),
        pool: boot.pool.clone(),
        orchestrator,
        evidence: Arc::new(ricc_cli::evidence_service(&boot)),
        artifacts: Arc::new(ricc_cli::artifact_service(&boot)),
        audit: Arc::new(ricc_cli::audit_service(&boot)),
        bus: boot.bus.clone(),
        store: boot.store.clone(),
    };

    let app = ricc_api::app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "ricc serve listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn canonicalize_worker() -> anyhow::Result<()> {
    let boot = ricc_cli::bootstrap().await?;
    let worker = CanonicalizeWorker::new(
        boot.pool.clone(),
        ricc_cli::evidence_service(&boot),
        ricc_cli::artifact_service(&boot),
        ricc_cli::audit_service(&boot),
        boot.bus.clone(),
        Arc::new(PlainTextExtractor),
        boot.config.extractor_version.clone(),
        boot.config.layout_version.clone(),
        boot.config.chunker_version.clone(),
        boot.config.chunk_schema_version.clone(),
        boot.config.chunk_max_chars,
        boot.config.chunk_overlap_chars,
        boot.config.retrieval_max_context_tokens,
        boot.config.worker_retry_attempts,
        std::time::Duration::from_millis(boot.config.worker_retry_base_delay_ms),
    );
    tracing::info!("canonicalize-worker running");
    worker.run(boot.bus.as_ref()).await?;
    Ok(())
}

async fn llm_worker() -> anyhow::Result<()> {
    let boot = ricc_cli::bootstrap().await?;
    let worker = LlmWorker::new(
        boot.pool.clone(),
        ricc_cli::artifact_service(&boot),
        ricc_cli::audit_service(&boot),
        boot.bus.clone(),
        Arc::new(StubLlm),
        boot.config.llm_model_version.clone(),
    );
    tracing::info!("llm-worker running");
    worker.run(boot.bus.as_ref()).await?;
    Ok(())
}

async fn soi_projector() -> anyhow::Result<()> {
    let boot = ricc_cli::bootstrap().await?;
    let projector = SoiProjector::new(boot.pool.clone(), ricc_cli::artifact_service(&boot));
    tracing::info!("soi-projector running");
    projector.run(boot.bus.as_ref()).await?;
    Ok(())
}

async fn verify_audit() -> anyhow::Result<()> {
    let boot = ricc_cli::bootstrap().await?;
    let audit = ricc_cli::audit_service(&boot);
    let broken = audit.verify_chain_integrity().await?;
    if broken == 0 {
        println!("ok: every audit chain verified intact");
    } else {
        println!("broken_links={broken}");
    }
    Ok(())
}
