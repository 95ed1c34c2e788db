//! # ricc-api — HTTP surface for the ingestion core (§6, §13's C13)
//!
//! Assembles the upload, lookup, and audit routes into a single Axum
//! application with a bearer-auth middleware layer and request tracing.
//!
//! ## API Surface
//!
//! | Route                        | Module              |
//! |-------------------------------|---------------------|
//! | `POST /v1/ingest`             | [`routes::ingest`]   |
//! | `GET /v1/document/:id`        | [`routes::lookup`]   |
//! | `GET /v1/version/:id`         | [`routes::lookup`]   |
//! | `GET /v1/file/:id`            | [`routes::lookup`]   |
//! | `GET /v1/artifact/:id`        | [`routes::lookup`]   |
//! | `GET /v1/version/:id/audit`   | [`routes::audit`]    |
//! | `GET /v1/audit/verify`        | [`routes::audit`]    |
//!
//! ## Middleware stack
//!
//! ```text
//! TraceLayer -> auth_middleware
//! ```
//!
//! `/healthz` sits outside the auth layer so a liveness probe never needs a
//! token.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let health = Router::new().route("/healthz", get(healthz));

    let api = Router::new()
        .route("/v1/ingest", axum::routing::post(routes::ingest::ingest))
        .route("/v1/document/:document_id", get(routes::lookup::get_document))
        .route("/v1/version/:version_id", get(routes::lookup::get_version))
        .route("/v1/file/:file_id", get(routes::lookup::get_file))
        .route("/v1/artifact/:artifact_id", get(routes::lookup::get_artifact))
        .route("/v1/version/:version_id/audit", get(routes::audit::get_version_audit))
        .route("/v1/audit/verify", get(routes::audit::verify_audit))
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .with_state(state);

    Router::new().merge(health).merge(api).layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use ricc_artifacts::ArtifactService;
    use ricc_audit::AuditService;
    use ricc_bus::InMemoryBus;
    use ricc_core::Config;
    use ricc_evidence::EvidenceService;
    use ricc_ingest::IngestOrchestrator;
    use ricc_store::LocalFsStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state(pool: sqlx::PgPool) -> AppState {
        std::env::set_var("AUTH_MODE", "none");
        let config = Arc::new(Config::from_env().unwrap());
        std::env::remove_var("AUTH_MODE");

        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ricc_store::ObjectStore> = Arc::new(LocalFsStore::new(dir.path()).await.unwrap());

        let evidence_for_orchestrator = EvidenceService::new(pool.clone(), store.clone());
        let audit_for_orchestrator = AuditService::new(pool.clone());
        let orchestrator = Arc::new(IngestOrchestrator::new(
            pool.clone(),
            evidence_for_orchestrator,
            audit_for_orchestrator,
            Arc::new(InMemoryBus::new(16)),
            None,
            false,
            config.llm_model_name.clone(),
            config.llm_model_version.clone(),
        ));

        AppState {
            config,
            pool: pool.clone(),
            orchestrator,
            evidence: Arc::new(EvidenceService::new(pool.clone(), store.clone())),
            artifacts: Arc::new(ArtifactService::new(pool.clone(), store.clone(), 50)),
            audit: Arc::new(AuditService::new(pool.clone())),
            bus: Arc::new(InMemoryBus::new(16)),
            store,
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn healthz_is_reachable_without_auth(pool: sqlx::PgPool) {
        let state = test_state(pool).await;
        let router = app(state);
        let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_document_id_returns_404(pool: sqlx::PgPool) {
        let state = test_state(pool).await;
        let router = app(state);
        let req = Request::builder()
            .uri(format!("/v1/document/{}", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error_kind"], "NOT_FOUND");
    }
}
