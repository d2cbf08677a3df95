//! Error types for the plugin runtime

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias using the loader's error type
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Failures attaching a plugin to the running service
///
/// During bulk loads these are recorded on the plugin's
/// [`LoadedPluginInfo`](crate::LoadedPluginInfo) rather than returned.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Plugin '{slug}' is not installed")]
    PluginNotInstalled { slug: String },

    #[error("Entry module '{entry}' of plugin '{slug}' not found")]
    EntryModuleNotFound { slug: String, entry: String },

    /// No compiled-in registration exists for an internal plugin
    #[error("Plugin '{slug}' does not export a route registration: {message}")]
    InvalidPluginExport { slug: String, message: String },

    #[error("Invalid manifest for plugin '{slug}': {message}")]
    InvalidManifest { slug: String, message: String },

    #[error("Invalid external base URL '{url}' for plugin '{slug}': {message}")]
    InvalidBaseUrl {
        slug: String,
        url: String,
        message: String,
    },

    /// An internal plugin's registration function rejected its configuration
    #[error("Plugin '{slug}' failed to register routes: {message}")]
    RegistrationFailed { slug: String, message: String },

    /// Strict bulk load stopped at the first failure
    #[error("Bulk load aborted at plugin '{slug}': {source}")]
    BatchAborted {
        slug: String,
        #[source]
        source: Box<LoaderError>,
    },

    #[error(transparent)]
    Extension(#[from] emporium_extensions::ExtensionError),
}

impl LoaderError {
    pub fn not_installed(slug: impl Into<String>) -> Self {
        Self::PluginNotInstalled { slug: slug.into() }
    }

    pub fn entry_not_found(slug: impl Into<String>, entry: impl Into<String>) -> Self {
        Self::EntryModuleNotFound {
            slug: slug.into(),
            entry: entry.into(),
        }
    }

    pub fn invalid_export(slug: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPluginExport {
            slug: slug.into(),
            message: message.into(),
        }
    }

    pub fn invalid_manifest(slug: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            slug: slug.into(),
            message: message.into(),
        }
    }

    pub fn registration_failed(slug: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            slug: slug.into(),
            message: message.into(),
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::PluginNotInstalled { .. } => StatusCode::NOT_FOUND,
            Self::BatchAborted { source, .. } => source.http_status(),
            Self::Extension(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// Per-request failures of the reverse proxy
///
/// These never change loader state; they become gateway responses.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream {url} unreachable: {message}")]
    Connect { url: String, message: String },

    #[error("Upstream {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Upstream {url} failed: {message}")]
    Upstream { url: String, message: String },

    #[error("Failed to build proxy client: {0}")]
    Client(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Connect { .. } | Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
