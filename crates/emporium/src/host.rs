//! Wiring of the installer and plugin loader from configuration
//!
//! Both halves share one [`SlugLocks`] so an install and a load of the same
//! plugin never interleave.

use anyhow::{Context, Result};
use camino::Utf8Path;
use emporium_core::{EmporiumConfig, HierarchicalConfigLoader};
use emporium_extensions::{ExtensionInstaller, SlugLocks};
use emporium_plugins::{
    BulkMode, InternalPluginCatalog, LoadOptions, LoadedPluginInfo, PluginLoader, ReverseProxy,
    RouteTable,
};
use tracing::debug;

pub fn load_config(path: Option<&Utf8Path>) -> Result<EmporiumConfig> {
    let loader = match path {
        Some(path) => HierarchicalConfigLoader::with_file(path.to_path_buf()),
        None => HierarchicalConfigLoader::new(),
    };
    loader.load().context("Failed to load configuration")
}

#[derive(Debug, Clone)]
pub struct Host {
    pub config: EmporiumConfig,
    pub installer: ExtensionInstaller,
    pub loader: PluginLoader,
}

impl Host {
    pub fn new(config: EmporiumConfig) -> Result<Self> {
        Self::with_catalog(config, InternalPluginCatalog::builtin())
    }

    pub fn with_catalog(config: EmporiumConfig, catalog: InternalPluginCatalog) -> Result<Self> {
        debug!("Extensions root: {}", config.extensions_root);
        let locks = SlugLocks::new();
        let installer = ExtensionInstaller::new(config.extensions_root.clone(), locks.clone());

        let proxy = ReverseProxy::new(&config.proxy).context("Failed to build proxy client")?;
        let routes = RouteTable::new().with_body_limit(config.server.max_upload_bytes);
        let loader = PluginLoader::new(installer.layout().clone(), routes, catalog, proxy, locks)
            .with_route_prefix(config.loader.route_prefix.clone());

        Ok(Self {
            config,
            installer,
            loader,
        })
    }

    pub fn load_options(&self, slug: &str) -> LoadOptions {
        LoadOptions::from(&self.config.plugin_settings(slug))
    }

    /// Load every installed plugin with its configured options
    pub async fn load_plugins(&self, mode: BulkMode) -> Result<Vec<LoadedPluginInfo>> {
        let loaded = self
            .loader
            .load_all(mode, |slug| self.load_options(slug))
            .await?;
        Ok(loaded)
    }
}
