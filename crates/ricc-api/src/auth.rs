//! Bearer-token authentication middleware (§6 Auth, §7.1).
//!
//! `AUTH_MODE=jwt_hs256` (the default) validates `Authorization: Bearer
//! <jwt>` against `JWT_HS256_SECRET`, checking `aud`/`iss` against
//! `JWT_AUD`/`JWT_ISS`. `AUTH_MODE=none` is a development escape hatch: every
//! request is treated as an authenticated system actor without a token.
//! Either way, the middleware injects a [`CallerIdentity`] into the
//! request extensions; handlers pull it out via the `FromRequestParts` impl
//! rather than re-parsing the header themselves.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, DecodingKey, Validation};
use ricc_core::AuthMode;
use serde::{Deserialize, Serialize};

use crate::error::ErrorBody;
use crate::state::AppState;

/// The identity of the caller a handler acts on behalf of (audit `actor`,
/// `uploaded_by`). A bare string rather than a role/claims struct — this
/// crate's surface has no role-gated endpoints, only an authenticated vs.
/// unauthenticated boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    exp: Option<usize>,
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CallerIdentity>().cloned().ok_or_else(|| {
            unauthorized("no caller identity in request context; auth middleware did not run")
        })
    }
}

fn unauthorized(detail: &str) -> Response {
    let body = ErrorBody { error_kind: "UNAUTHORIZED", detail: detail.to_string(), correlation_id: None };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Tower middleware validating the bearer token (or, in `AUTH_MODE=none`,
/// doing nothing) and injecting [`CallerIdentity`] for downstream handlers.
pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match state.config.auth_mode {
        AuthMode::None => {
            req.extensions_mut().insert(CallerIdentity { subject: "anonymous".to_string() });
            next.run(req).await
        }
        AuthMode::JwtHs256 => {
            let header_value = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
            let token = match header_value.and_then(|v| v.strip_prefix("Bearer ")) {
                Some(t) => t,
                None => return unauthorized("missing Authorization: Bearer <jwt> header"),
            };

            let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
            validation.set_audience(&[&state.config.jwt_aud]);
            validation.set_issuer(&[&state.config.jwt_iss]);
            let key = DecodingKey::from_secret(state.config.jwt_hs256_secret.as_bytes());

            match decode::<Claims>(token, &key, &validation) {
                Ok(data) => {
                    req.extensions_mut().insert(CallerIdentity { subject: data.claims.sub });
                    next.run(req).await
                }
                Err(e) => unauthorized(&format!("invalid bearer token: {e}")),
            }
        }
    }
}
