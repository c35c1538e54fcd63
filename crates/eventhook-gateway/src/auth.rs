use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::types::ErrorResponse;

/// Routes reachable without a token
const PUBLIC_PATHS: &[&str] = &["/health"];

/// Bearer token required on the admin API. No token disables auth.
#[derive(Clone)]
pub struct AuthConfig {
    pub api_token: Option<String>,
}

impl AuthConfig {
    pub fn new(api_token: Option<String>) -> Self {
        Self {
            api_token: api_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_token.is_some()
    }

    fn accepts(&self, presented: &str) -> bool {
        self.api_token
            .as_ref()
            .is_some_and(|expected| presented.as_bytes().ct_eq(expected.as_bytes()).into())
    }
}

pub async fn auth_middleware(auth_config: Arc<AuthConfig>, request: Request, next: Next) -> Response {
    if !auth_config.is_enabled() || PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if presented.is_some_and(|token| auth_config.accepts(token)) {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Rejected unauthenticated admin request");
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Unauthorized".to_string(),
        }),
    )
        .into_response()
}
