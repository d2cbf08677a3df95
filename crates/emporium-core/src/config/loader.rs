//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Config file (`--config <path>`, else `./emporium.yaml` when present)
//! 3. Environment variables (EMPORIUM_* prefix)
//! 4. CLI flags (handled by caller)

use super::types::EmporiumConfig;
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::Value;
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "emporium.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Explicit config file, if the caller passed one
    config_file: Option<Utf8PathBuf>,
}

impl HierarchicalConfigLoader {
    /// Create a loader that looks for `./emporium.yaml`
    pub fn new() -> Self {
        Self { config_file: None }
    }

    /// Create a loader bound to an explicit config file, which must exist
    pub fn with_file(config_file: Utf8PathBuf) -> Self {
        Self {
            config_file: Some(config_file),
        }
    }

    /// Load configuration with hierarchical precedence
    pub fn load(&self) -> Result<EmporiumConfig> {
        let mut merged = Self::load_embedded_value("defaults.yaml")?;

        if let Some(path) = self.resolve_config_file()? {
            debug!("Loading configuration overlay from {}", path);
            let overlay = Self::load_yaml_value(&path)?;
            merge_values(&mut merged, overlay);
        }

        let config: EmporiumConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("Failed to build configuration: {}", e)))?;

        Self::apply_env_overrides(config)
    }

    fn resolve_config_file(&self) -> Result<Option<Utf8PathBuf>> {
        match &self.config_file {
            Some(path) if path.exists() => Ok(Some(path.clone())),
            Some(path) => Err(Error::config_not_found(path.as_str())),
            None => {
                let local = Utf8PathBuf::from(DEFAULT_CONFIG_FILE);
                Ok(local.exists().then_some(local))
            }
        }
    }

    /// Load an embedded configuration file
    fn load_embedded_value(filename: &str) -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    /// Load a YAML file as an untyped value
    fn load_yaml_value(path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
        // An empty file parses as null and means "no overrides"
        Ok(match value {
            Value::Null => Value::Mapping(Default::default()),
            other => other,
        })
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: EmporiumConfig) -> Result<EmporiumConfig> {
        if let Ok(val) = env::var("EMPORIUM_EXTENSIONS_ROOT") {
            config.extensions_root = Utf8PathBuf::from(val);
        }

        if let Ok(val) = env::var("EMPORIUM_BIND") {
            config.server.bind = val;
        }

        if let Ok(val) = env::var("EMPORIUM_ADMIN_TOKEN") {
            config.server.admin_token = (!val.is_empty()).then_some(val);
        }

        if let Ok(val) = env::var("EMPORIUM_PROXY_TIMEOUT_SECS") {
            config.proxy.timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("EMPORIUM_PROXY_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("EMPORIUM_CLEAR_SCRATCH_ON_START") {
            config.loader.clear_scratch_on_start = parse_bool(&val).ok_or_else(|| {
                Error::invalid_config("EMPORIUM_CLEAR_SCRATCH_ON_START must be true or false")
            })?;
        }

        Ok(config)
    }
}

impl Default for HierarchicalConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Deep-merge `overlay` into `base`; mappings merge by key, everything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
