//! Error types for extension installation

use emporium_core::ExtensionKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the installer's error type
pub type Result<T> = std::result::Result<T, ExtensionError>;

/// Installation and store failures
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// Upload is not a readable zip archive
    #[error("Invalid archive: {message}")]
    ArchiveInvalid { message: String },

    /// Manifest file absent from the archive root
    #[error("Manifest file '{file}' not found in archive")]
    ManifestMissing { file: String },

    /// Manifest present but unparseable or failing a validation rule
    #[error("Invalid manifest: {message}")]
    ManifestInvalid { message: String },

    /// Target slug has no installed directory
    #[error("{kind} '{slug}' is not installed")]
    NotInstalled { kind: ExtensionKind, slug: String },

    /// Directory exists but neither metadata nor manifest can be read
    #[error("{kind} '{slug}' is installed but unreadable: {message}")]
    Corrupted {
        kind: ExtensionKind,
        slug: String,
        message: String,
    },

    /// Filesystem failure while extracting into the scratch root
    #[error("Staging failed at {}: {source}", .path.display())]
    StagingFailed { path: PathBuf, source: io::Error },

    /// Filesystem failure while moving into place or writing metadata
    #[error("Commit failed at {}: {source}", .path.display())]
    CommitFailed { path: PathBuf, source: io::Error },

    /// Filesystem failure while enumerating installed extensions
    #[error("Failed to read {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Unknown kind or source string from a caller
    #[error(transparent)]
    Input(#[from] emporium_core::Error),
}

impl ExtensionError {
    pub fn archive_invalid(message: impl Into<String>) -> Self {
        Self::ArchiveInvalid {
            message: message.into(),
        }
    }

    pub fn manifest_missing(file: impl Into<String>) -> Self {
        Self::ManifestMissing { file: file.into() }
    }

    pub fn manifest_invalid(message: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            message: message.into(),
        }
    }

    pub fn not_installed(kind: ExtensionKind, slug: impl Into<String>) -> Self {
        Self::NotInstalled {
            kind,
            slug: slug.into(),
        }
    }

    pub fn corrupted(kind: ExtensionKind, slug: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            kind,
            slug: slug.into(),
            message: message.into(),
        }
    }

    pub fn staging_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StagingFailed {
            path: path.into(),
            source,
        }
    }

    pub fn commit_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CommitFailed {
            path: path.into(),
            source,
        }
    }

    pub fn read_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ReadFailed {
            path: path.into(),
            source,
        }
    }

    /// HTTP-equivalent status class for this failure
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ArchiveInvalid { .. }
            | Self::ManifestMissing { .. }
            | Self::ManifestInvalid { .. }
            | Self::Input(_) => 400,
            Self::NotInstalled { .. } => 404,
            Self::Corrupted { .. }
            | Self::StagingFailed { .. }
            | Self::CommitFailed { .. }
            | Self::ReadFailed { .. } => 500,
        }
    }

    /// Whether the uploader can fix this by changing the archive
    pub fn is_user_correctable(&self) -> bool {
        self.http_status() == 400
    }
}
