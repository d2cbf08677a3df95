//! Error types for emporium-core

use thiserror::Error;

/// Result type alias using emporium-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Emporium
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown extension kind
    #[error("Unknown extension kind: {kind}. Valid kinds: theme-shop, theme-admin, plugin")]
    InvalidKind { kind: String },

    /// Unknown extension source
    #[error("Unknown extension source: {source_name}. Valid sources: local-zip, official-market")]
    InvalidSource { source_name: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid kind error
    pub fn invalid_kind(kind: impl Into<String>) -> Self {
        Self::InvalidKind { kind: kind.into() }
    }

    /// Create an invalid source error
    pub fn invalid_source(source_name: impl Into<String>) -> Self {
        Self::InvalidSource {
            source_name: source_name.into(),
        }
    }
}
