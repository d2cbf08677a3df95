//! Installed-extension records
//!
//! These are what `.installed.json` holds and what the read path returns.
//! `fsPath` is never trusted from disk; the store overwrites it with the
//! path derived from kind + slug on every read.

use crate::error::{ExtensionError, Result};
use crate::manifest::Manifest;
use chrono::{DateTime, Utc};
use emporium_core::{ExtensionKind, ExtensionSource, RuntimeType, ThemeTarget};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CATEGORY: &str = "general";

/// System-assigned fields shared by every record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
    pub id: String,
    pub source: ExtensionSource,
    pub fs_path: PathBuf,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMeta {
    /// Fresh metadata for a new install
    pub fn fresh(source: ExtensionSource, fs_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            fs_path: fs_path.into(),
            installed_at: now,
            updated_at: now,
        }
    }

    /// Metadata rebuilt from the filesystem when `.installed.json` is unusable
    ///
    /// The id is derived from kind + slug so repeated reads agree. Birth time
    /// is used for `installedAt` where the platform reports it.
    pub fn reconstructed(kind: ExtensionKind, slug: &str, dir: &Path, meta: &std::fs::Metadata) -> Self {
        let updated_at: DateTime<Utc> = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let installed_at = meta
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(updated_at);
        Self {
            id: format!("{}:{}", kind, slug),
            source: ExtensionSource::LocalZip,
            fs_path: dir.to_path_buf(),
            installed_at,
            updated_at,
        }
    }
}

/// A record type the store can persist and rebuild
pub trait InstalledRecord: Serialize + DeserializeOwned + Send + 'static {
    fn slug(&self) -> &str;

    fn set_fs_path(&mut self, path: PathBuf);

    /// Build the record from a validated manifest of `kind`
    fn from_manifest(manifest: Manifest, kind: ExtensionKind, meta: RecordMeta) -> Result<Self>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledTheme {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub target: ThemeTarget,
    #[serde(default)]
    pub source: ExtensionSource,
    pub fs_path: PathBuf,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstalledRecord for InstalledTheme {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn set_fs_path(&mut self, path: PathBuf) {
        self.fs_path = path;
    }

    fn from_manifest(manifest: Manifest, kind: ExtensionKind, meta: RecordMeta) -> Result<Self> {
        let (Manifest::Theme(m), Some(target)) = (manifest, kind.theme_target()) else {
            return Err(ExtensionError::manifest_invalid(format!(
                "{} requires a theme manifest",
                kind
            )));
        };
        Ok(Self {
            id: meta.id,
            slug: m.slug,
            name: m.name,
            version: m.version,
            description: m.description.unwrap_or_default(),
            category: m.category.unwrap_or_else(default_category),
            author: m.author,
            thumbnail: m.thumbnail,
            target,
            source: meta.source,
            fs_path: meta.fs_path,
            installed_at: meta.installed_at,
            updated_at: meta.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPlugin {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub runtime_type: RuntimeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_base_url: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub source: ExtensionSource,
    pub fs_path: PathBuf,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstalledRecord for InstalledPlugin {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn set_fs_path(&mut self, path: PathBuf) {
        self.fs_path = path;
    }

    fn from_manifest(manifest: Manifest, kind: ExtensionKind, meta: RecordMeta) -> Result<Self> {
        let Manifest::Plugin(m) = manifest else {
            return Err(ExtensionError::manifest_invalid(format!(
                "{} requires a plugin manifest",
                kind
            )));
        };
        Ok(Self {
            id: meta.id,
            slug: m.slug,
            name: m.name,
            version: m.version,
            description: m.description.unwrap_or_default(),
            category: m.category.unwrap_or_else(default_category),
            author: m.author,
            runtime_type: m.runtime_type,
            entry_module: m.entry_module,
            external_base_url: m.external_base_url,
            permissions: m.permissions,
            source: meta.source,
            fs_path: meta.fs_path,
            installed_at: meta.installed_at,
            updated_at: meta.updated_at,
        })
    }
}

/// Either record, for callers that handle every kind uniformly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstalledExtension {
    Theme(InstalledTheme),
    Plugin(InstalledPlugin),
}

impl InstalledExtension {
    pub fn slug(&self) -> &str {
        match self {
            InstalledExtension::Theme(t) => &t.slug,
            InstalledExtension::Plugin(p) => &p.slug,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            InstalledExtension::Theme(t) => &t.name,
            InstalledExtension::Plugin(p) => &p.name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            InstalledExtension::Theme(t) => &t.version,
            InstalledExtension::Plugin(p) => &p.version,
        }
    }

    pub fn source(&self) -> ExtensionSource {
        match self {
            InstalledExtension::Theme(t) => t.source,
            InstalledExtension::Plugin(p) => p.source,
        }
    }

    pub fn fs_path(&self) -> &Path {
        match self {
            InstalledExtension::Theme(t) => &t.fs_path,
            InstalledExtension::Plugin(p) => &p.fs_path,
        }
    }

    pub fn installed_at(&self) -> DateTime<Utc> {
        match self {
            InstalledExtension::Theme(t) => t.installed_at,
            InstalledExtension::Plugin(p) => p.installed_at,
        }
    }
}

impl From<InstalledTheme> for InstalledExtension {
    fn from(theme: InstalledTheme) -> Self {
        InstalledExtension::Theme(theme)
    }
}

impl From<InstalledPlugin> for InstalledExtension {
    fn from(plugin: InstalledPlugin) -> Self {
        InstalledExtension::Plugin(plugin)
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}
