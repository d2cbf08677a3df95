//! Catalog of internal plugins compiled into the host
//!
//! An `internal-fastify` plugin's code cannot be loaded from its archive at
//! runtime. Its routes come from an [`InternalPlugin`] registered here under
//! the plugin's slug; the installed archive still supplies the manifest and
//! entry module, which must exist for the load to proceed.

use crate::error::Result;
use crate::http::PluginRouter;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Route registration for one internal plugin
pub trait InternalPlugin: Send + Sync {
    /// Slug this registration answers for
    fn slug(&self) -> &str;

    /// Add the plugin's routes, given its configuration from `plugins.<slug>.config`
    fn register(&self, router: &mut PluginRouter, config: &Value) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct InternalPluginCatalog {
    plugins: BTreeMap<String, Arc<dyn InternalPlugin>>,
}

impl InternalPluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the plugins that ship with the host
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(crate::builtin::Announcements);
        catalog
    }

    /// Add a plugin, replacing any registration for the same slug
    pub fn register<P: InternalPlugin + 'static>(&mut self, plugin: P) -> &mut Self {
        self.plugins.insert(plugin.slug().to_string(), Arc::new(plugin));
        self
    }

    pub fn get(&self, slug: &str) -> Option<Arc<dyn InternalPlugin>> {
        self.plugins.get(slug).cloned()
    }

    pub fn slugs(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for InternalPluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalPluginCatalog")
            .field("slugs", &self.slugs())
            .finish()
    }
}
