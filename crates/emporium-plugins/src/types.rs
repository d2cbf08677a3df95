//! Runtime-only plugin state

use chrono::{DateTime, Utc};
use emporium_core::config::PluginSettings;
use emporium_core::RuntimeType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loaded,
    Failed,
    Disabled,
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LoadStatus::Loaded => "loaded",
            LoadStatus::Failed => "failed",
            LoadStatus::Disabled => "disabled",
        })
    }
}

/// Outcome of the latest load attempt for one slug; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedPluginInfo {
    pub slug: String,
    pub name: String,
    pub version: String,
    /// Absent when the manifest could not be read
    pub runtime_type: Option<RuntimeType>,
    pub status: LoadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Route prefix the plugin is mounted under, when loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_prefix: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedPluginInfo {
    pub fn is_loaded(&self) -> bool {
        self.status == LoadStatus::Loaded
    }
}

/// Caller-supplied options for one load attempt
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Record `disabled` and attach nothing
    pub disabled: bool,
    /// Overrides the loader's prefix template
    pub route_prefix: Option<String>,
    /// Passed to internal plugins at registration
    pub config: serde_json::Value,
}

impl From<&PluginSettings> for LoadOptions {
    fn from(settings: &PluginSettings) -> Self {
        Self {
            disabled: !settings.enabled,
            route_prefix: settings.route_prefix.clone(),
            config: settings.config.clone(),
        }
    }
}

/// Failure policy for loading every installed plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// Record failures and continue (startup)
    SkipOnError,
    /// Stop at the first failure
    Strict,
}
