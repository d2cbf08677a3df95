//! JSON error responses for the administrative surface

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use emporium_extensions::ExtensionError;
use emporium_plugins::LoaderError;
use serde_json::json;
use tracing::{error, warn};

/// Error rendered as `{"error": "<reason>"}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "admin access required")
    }

    /// Install failures: bad input or an unreadable archive are the caller's
    /// fault, everything past extraction is reported as a server failure
    pub fn install(e: ExtensionError) -> Self {
        let status = match e {
            ExtensionError::Input(_) | ExtensionError::ArchiveInvalid { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }

    /// Uninstall failures, including a slug that is not installed
    pub fn uninstall(e: ExtensionError) -> Self {
        let status = match e {
            ExtensionError::Input(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ExtensionError> for ApiError {
    fn from(e: ExtensionError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.to_string())
    }
}

impl From<LoaderError> for ApiError {
    fn from(e: LoaderError) -> Self {
        Self::new(e.http_status(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self.message);
        } else {
            warn!("{} ({})", self.message, self.status);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
