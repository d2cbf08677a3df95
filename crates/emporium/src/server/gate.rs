//! Admin access decision for the administrative routes
//!
//! The server only asks whether a request is permitted. Plugin routes are
//! never gated here; plugins enforce their own access rules.

use super::error::ApiError;
use super::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use emporium_core::config::ServerConfig;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

pub trait AdminGate: Send + Sync {
    fn permits(&self, headers: &HeaderMap) -> bool;
}

/// Permits everything, or only requests carrying the configured token
#[derive(Debug, Clone, Default)]
pub struct TokenGate {
    token: Option<String>,
}

impl TokenGate {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.admin_token.clone())
    }
}

impl AdminGate for TokenGate {
    fn permits(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.token else {
            return true;
        };
        headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|presented| presented == expected)
    }
}

pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.gate.permits(request.headers()) {
        next.run(request).await
    } else {
        ApiError::unauthorized().into_response()
    }
}
