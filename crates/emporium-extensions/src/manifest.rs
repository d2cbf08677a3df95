//! Manifest reading and validation
//!
//! Manifests are JSON objects at the extension root: `theme.json` for themes,
//! `manifest.json` for plugins. Validation is fail-fast and runs in a fixed
//! order so the same broken manifest always reports the same error:
//!
//! 1. `slug` present, a string, non-empty
//! 2. `name` present, a string, non-empty
//! 3. `version` present, a string, non-empty
//! 4. `slug` matches `^[a-z0-9-]+$`
//! 5. plugins: `runtimeType` is `internal-fastify` or `external-http`
//! 6. plugins, internal: `entryModule` present
//! 7. plugins, external: `externalBaseUrl` present
//!
//! Optional display fields are carried as-is; defaults are applied when the
//! installed record is built, not here.

use crate::error::{ExtensionError, Result};
use emporium_core::{is_valid_slug, ExtensionKind, RuntimeType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest as read from disk, before any rule has been applied
#[derive(Debug, Clone)]
pub struct RawManifest {
    pub path: PathBuf,
    fields: Map<String, Value>,
}

impl RawManifest {
    pub fn from_fields(path: impl Into<PathBuf>, fields: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn optional_string(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn required_string(&self, key: &str) -> Result<String> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Err(ExtensionError::manifest_invalid(format!(
                "field '{}' is required",
                key
            ))),
            Some(Value::String(s)) if s.is_empty() => Err(
                ExtensionError::manifest_invalid(format!("field '{}' must not be empty", key)),
            ),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ExtensionError::manifest_invalid(format!(
                "field '{}' must be a string",
                key
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeManifest {
    pub slug: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub slug: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub runtime_type: RuntimeType,
    pub entry_module: Option<String>,
    pub external_base_url: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// A manifest that passed every rule for its kind
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Theme(ThemeManifest),
    Plugin(PluginManifest),
}

impl Manifest {
    pub fn slug(&self) -> &str {
        match self {
            Manifest::Theme(m) => &m.slug,
            Manifest::Plugin(m) => &m.slug,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Manifest::Theme(m) => &m.name,
            Manifest::Plugin(m) => &m.name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Manifest::Theme(m) => &m.version,
            Manifest::Plugin(m) => &m.version,
        }
    }
}

/// Read the kind's manifest file from `dir`
pub async fn read_manifest(dir: &Path, kind: ExtensionKind) -> Result<RawManifest> {
    let path = dir.join(kind.manifest_file());
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ExtensionError::manifest_missing(kind.manifest_file()))
        }
        Err(e) => {
            return Err(ExtensionError::manifest_invalid(format!(
                "unable to read {}: {}",
                kind.manifest_file(),
                e
            )))
        }
    };

    let value: Value = serde_json::from_str(&content).map_err(|e| {
        ExtensionError::manifest_invalid(format!("{} is not valid JSON: {}", kind.manifest_file(), e))
    })?;

    match value {
        Value::Object(fields) => {
            debug!("Read manifest {:?}", path);
            Ok(RawManifest::from_fields(path, fields))
        }
        _ => Err(ExtensionError::manifest_invalid(format!(
            "{} must contain a JSON object",
            kind.manifest_file()
        ))),
    }
}

/// Locate the extension root inside a staging directory
///
/// The manifest normally sits at the archive root. Archives made by zipping a
/// folder wrap everything in one directory; that directory is accepted when it
/// is the only entry holding the manifest.
pub async fn find_manifest_root(staging_dir: &Path, kind: ExtensionKind) -> Result<PathBuf> {
    let file = kind.manifest_file();
    if tokio::fs::try_exists(staging_dir.join(file)).await.unwrap_or(false) {
        return Ok(staging_dir.to_path_buf());
    }

    let mut entries = tokio::fs::read_dir(staging_dir)
        .await
        .map_err(|e| ExtensionError::staging_failed(staging_dir, e))?;
    let mut dirs = Vec::new();
    let mut has_files = false;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExtensionError::staging_failed(staging_dir, e))?
    {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with("__MACOSX") {
            continue;
        }
        match entry.file_type().await {
            Ok(ft) if ft.is_dir() => dirs.push(entry.path()),
            _ => has_files = true,
        }
    }

    if let ([only], false) = (dirs.as_slice(), has_files) {
        if tokio::fs::try_exists(only.join(file)).await.unwrap_or(false) {
            debug!("Using wrapped extension root {:?}", only);
            return Ok(only.clone());
        }
    }

    Err(ExtensionError::manifest_missing(file))
}

/// Apply the kind's validation rules
pub fn validate(raw: &RawManifest, kind: ExtensionKind) -> Result<Manifest> {
    match kind {
        ExtensionKind::Plugin => validate_plugin(raw).map(Manifest::Plugin),
        ExtensionKind::ThemeShop | ExtensionKind::ThemeAdmin => {
            validate_theme(raw).map(Manifest::Theme)
        }
    }
}

/// Rules 1-4, shared by every kind
fn validate_common(raw: &RawManifest) -> Result<(String, String, String)> {
    let slug = raw.required_string("slug")?;
    let name = raw.required_string("name")?;
    let version = raw.required_string("version")?;

    if !is_valid_slug(&slug) {
        return Err(ExtensionError::manifest_invalid(format!(
            "slug '{}' must contain only lowercase letters, digits and hyphens",
            slug
        )));
    }

    Ok((slug, name, version))
}

pub fn validate_theme(raw: &RawManifest) -> Result<ThemeManifest> {
    let (slug, name, version) = validate_common(raw)?;
    Ok(ThemeManifest {
        slug,
        name,
        version,
        description: raw.optional_string("description"),
        category: raw.optional_string("category"),
        author: raw.optional_string("author"),
        thumbnail: raw.optional_string("thumbnail"),
    })
}

pub fn validate_plugin(raw: &RawManifest) -> Result<PluginManifest> {
    let (slug, name, version) = validate_common(raw)?;

    let runtime_type = raw
        .get("runtimeType")
        .and_then(Value::as_str)
        .and_then(RuntimeType::parse)
        .ok_or_else(|| {
            ExtensionError::manifest_invalid(
                "field 'runtimeType' must be one of: internal-fastify, external-http",
            )
        })?;

    let (entry_module, external_base_url) = match runtime_type {
        RuntimeType::Internal => (
            Some(required_for_runtime(raw, "entryModule", runtime_type)?),
            raw.optional_string("externalBaseUrl"),
        ),
        RuntimeType::External => (
            raw.optional_string("entryModule"),
            Some(required_for_runtime(raw, "externalBaseUrl", runtime_type)?),
        ),
    };

    let permissions = raw
        .get("permissions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(PluginManifest {
        slug,
        name,
        version,
        description: raw.optional_string("description"),
        category: raw.optional_string("category"),
        author: raw.optional_string("author"),
        runtime_type,
        entry_module,
        external_base_url,
        permissions,
    })
}

fn required_for_runtime(raw: &RawManifest, key: &str, runtime: RuntimeType) -> Result<String> {
    raw.required_string(key).map_err(|_| {
        ExtensionError::manifest_invalid(format!(
            "field '{}' is required when runtimeType is '{}'",
            key, runtime
        ))
    })
}

/// Read and validate in one step
pub async fn load_manifest(dir: &Path, kind: ExtensionKind) -> Result<Manifest> {
    let raw = read_manifest(dir, kind).await?;
    validate(&raw, kind)
}
