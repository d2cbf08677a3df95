//! Configuration types for the extension host
//!
//! Every section has serde defaults so partial files merge cleanly over the
//! embedded defaults.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EmporiumConfig {
    /// Root of the on-disk extension layout (`themes/`, `plugins/`, `.tmp/`)
    #[serde(default = "default_extensions_root")]
    pub extensions_root: Utf8PathBuf,

    /// Administrative HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Reverse proxy settings for external-http plugins
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Plugin runtime loader settings
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Per-plugin options keyed by slug
    #[serde(default)]
    pub plugins: HashMap<String, PluginSettings>,
}

impl Default for EmporiumConfig {
    fn default() -> Self {
        Self {
            extensions_root: default_extensions_root(),
            server: ServerConfig::default(),
            proxy: ProxyConfig::default(),
            loader: LoaderConfig::default(),
            plugins: HashMap::new(),
        }
    }
}

impl EmporiumConfig {
    /// Options for a plugin, falling back to enabled-with-no-config
    pub fn plugin_settings(&self, slug: &str) -> PluginSettings {
        self.plugins.get(slug).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Socket address the admin server listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Shared secret expected in the `x-admin-token` header, if any
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Upper bound for uploaded archives
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            admin_token: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProxyConfig {
    /// Whole-request timeout for a proxied call
    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,

    /// TCP connect timeout for a proxied call
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// User agent sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_proxy_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoaderConfig {
    /// Route prefix template; `{slug}` is replaced with the plugin slug
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Bulk-load installed plugins when the server starts
    #[serde(default = "default_true")]
    pub load_on_start: bool,

    /// Remove leftover staging directories when the server starts
    #[serde(default = "default_true")]
    pub clear_scratch_on_start: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            route_prefix: default_route_prefix(),
            load_on_start: true,
            clear_scratch_on_start: true,
        }
    }
}

/// Caller-supplied options for a single plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Free-form configuration handed to internal plugins on registration
    #[serde(default)]
    pub config: serde_json::Value,

    /// Overrides the loader-wide route prefix for this plugin
    #[serde(default)]
    pub route_prefix: Option<String>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            config: serde_json::Value::Null,
            route_prefix: None,
        }
    }
}

fn default_extensions_root() -> Utf8PathBuf {
    Utf8PathBuf::from("extensions")
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_proxy_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_user_agent() -> String {
    format!(
        "emporium/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
fn default_route_prefix() -> String {
    "/plugins/{slug}/api".to_string()
}
fn default_true() -> bool {
    true
}
