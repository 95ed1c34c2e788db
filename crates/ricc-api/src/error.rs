//! Maps [`CoreError`] onto the HTTP status codes and `{error_kind, detail,
//! correlation_id}` body shape of §7, per §7.1's wrapping rule.
//!
//! Workers never construct an [`AppError`] — only this crate's handlers do,
//! at the point a [`CoreError`] is about to leave the process as a
//! response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ricc_core::{CoreError, CorrelationId};
use serde::Serialize;

/// The wire shape every failed response carries (§7): `error_kind` is
/// stable across releases (see [`CoreError::error_kind`]), `detail` is
/// human-readable context, `correlation_id` ties the response back to the
/// audit trail for this request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_kind: &'static str,
    pub detail: String,
    pub correlation_id: Option<CorrelationId>,
}

#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct AppError {
    pub source: CoreError,
    pub correlation_id: Option<CorrelationId>,
}

impl AppError {
    pub fn new(source: CoreError) -> Self {
        Self { source, correlation_id: None }
    }

    pub fn with_correlation(source: CoreError, correlation_id: CorrelationId) -> Self {
        Self { source, correlation_id: Some(correlation_id) }
    }
}

impl From<CoreError> for AppError {
    fn from(source: CoreError) -> Self {
        AppError::new(source)
    }
}

fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::ValidationMissingFields { .. }
        | CoreError::PayloadTooLarge { .. }
        | CoreError::UnsupportedMime { .. }
        | CoreError::InvalidPrimaryAxis { .. }
        | CoreError::PrimaryAxisMismatch { .. }
        | CoreError::ParentVersionUnknown { .. }
        | CoreError::ParentVersionWrongDocument { .. } => StatusCode::BAD_REQUEST,
        CoreError::EvidenceNotFound { .. } | CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::DuplicateKey { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.source);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.source, correlation_id = ?self.correlation_id, "request failed");
        }
        let body = ErrorBody {
            error_kind: self.source.error_kind(),
            detail: self.source.detail(),
            correlation_id: self.correlation_id,
        };
        (status, Json(body)).into_response()
    }
}
