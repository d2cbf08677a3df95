//! Plugin runtime loader
//!
//! Attaches installed plugins to the live [`RouteTable`] and keeps a registry
//! of the latest load attempt per slug. The manifest is always read from
//! disk, never from cached install metadata, so manual edits take effect on
//! the next load. Loads and unloads take the same per-slug lock as the
//! installer, or run under a guard the installer already holds.

use crate::catalog::InternalPluginCatalog;
use crate::error::{LoaderError, Result};
use crate::http::PluginRouter;
use crate::proxy::{ProxyRoute, ReverseProxy};
use crate::routes::{RouteTable, RouteTarget};
use crate::types::{BulkMode, LoadOptions, LoadStatus, LoadedPluginInfo};
use chrono::Utc;
use emporium_core::{is_valid_slug, ExtensionKind, RuntimeType};
use emporium_extensions::manifest::{load_manifest, Manifest, PluginManifest};
use emporium_extensions::{ExtensionLayout, ExtensionStore, SlugGuard, SlugLocks};
use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_ROUTE_PREFIX: &str = "/plugins/{slug}/api";

#[derive(Clone)]
pub struct PluginLoader {
    layout: ExtensionLayout,
    routes: RouteTable,
    catalog: Arc<InternalPluginCatalog>,
    proxy: ReverseProxy,
    locks: SlugLocks,
    registry: Arc<RwLock<HashMap<String, LoadedPluginInfo>>>,
    route_prefix: String,
}

impl PluginLoader {
    pub fn new(
        layout: ExtensionLayout,
        routes: RouteTable,
        catalog: InternalPluginCatalog,
        proxy: ReverseProxy,
        locks: SlugLocks,
    ) -> Self {
        Self {
            layout,
            routes,
            catalog: Arc::new(catalog),
            proxy,
            locks,
            registry: Arc::default(),
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
        }
    }

    /// Prefix template; `{slug}` is replaced per plugin
    pub fn with_route_prefix(mut self, template: impl Into<String>) -> Self {
        self.route_prefix = template.into();
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn route_prefix_for(&self, slug: &str) -> String {
        self.route_prefix.replace("{slug}", slug)
    }

    /// Attach one plugin, replacing any earlier attachment
    ///
    /// The attempt is recorded whatever the outcome; a failure is also
    /// returned. Routes are swapped only once the new attachment is built,
    /// so a failed reload leaves the previous one serving. A plugin that is
    /// gone from disk or disabled is unmounted.
    pub async fn load(&self, slug: &str, options: &LoadOptions) -> Result<LoadedPluginInfo> {
        let guard = self.locks.lock(ExtensionKind::Plugin, slug).await;
        self.load_guarded(&guard, options).await
    }

    /// [`load`](Self::load) for a caller already holding the slug's lock
    ///
    /// The guard must come from the [`SlugLocks`] this loader was built with.
    pub async fn load_guarded(
        &self,
        guard: &SlugGuard,
        options: &LoadOptions,
    ) -> Result<LoadedPluginInfo> {
        if guard.kind() != ExtensionKind::Plugin {
            return Err(LoaderError::not_installed(guard.slug()));
        }
        let slug = guard.slug();

        let manifest = match self.read_manifest(slug).await {
            Ok(manifest) => manifest,
            Err(e @ LoaderError::PluginNotInstalled { .. }) => {
                self.routes.remove_slug(slug).await;
                return Err(self.record_failure(slug, None, e).await);
            }
            Err(e) => return Err(self.record_failure(slug, None, e).await),
        };

        if options.disabled {
            self.routes.remove_slug(slug).await;
            let info = self.info(&manifest, LoadStatus::Disabled, None, None);
            info!("Plugin '{}' is disabled, not attaching", slug);
            self.record(info.clone()).await;
            return Ok(info);
        }

        let prefix = options
            .route_prefix
            .clone()
            .unwrap_or_else(|| self.route_prefix_for(slug));

        let target = match manifest.runtime_type {
            RuntimeType::Internal => self.internal_target(&manifest, options).await,
            RuntimeType::External => self.external_target(&manifest),
        };

        match target {
            Ok(target) => {
                self.routes.replace_slug(slug, &prefix, target).await;
                let info = self.info(&manifest, LoadStatus::Loaded, None, Some(prefix));
                info!(
                    "Loaded plugin '{}' v{} ({})",
                    slug, manifest.version, manifest.runtime_type
                );
                self.record(info.clone()).await;
                Ok(info)
            }
            Err(e) => Err(self.record_failure(slug, Some(&manifest), e).await),
        }
    }

    /// Attach every installed plugin
    ///
    /// `options_for` supplies per-slug options. In [`BulkMode::SkipOnError`]
    /// failures are recorded and loading continues; in [`BulkMode::Strict`]
    /// the first failure aborts the batch.
    pub async fn load_all<F>(&self, mode: BulkMode, options_for: F) -> Result<Vec<LoadedPluginInfo>>
    where
        F: Fn(&str) -> LoadOptions,
    {
        let slugs = ExtensionStore::new(self.layout.clone())
            .installed_slugs(ExtensionKind::Plugin)
            .await?;
        info!("Loading {} installed plugin(s)", slugs.len());

        let mut results = Vec::with_capacity(slugs.len());
        for slug in slugs {
            match self.load(&slug, &options_for(&slug)).await {
                Ok(info) => results.push(info),
                Err(e) => match mode {
                    BulkMode::SkipOnError => {
                        if let Some(info) = self.status(&slug).await {
                            results.push(info);
                        }
                    }
                    BulkMode::Strict => {
                        return Err(LoaderError::BatchAborted {
                            slug,
                            source: Box::new(e),
                        })
                    }
                },
            }
        }

        let loaded = results.iter().filter(|i| i.is_loaded()).count();
        info!("Plugins loaded: {} of {}", loaded, results.len());
        Ok(results)
    }

    /// Detach a plugin and drop its registry entry
    ///
    /// Returns the entry that was dropped, if any.
    pub async fn unload(&self, slug: &str) -> Option<LoadedPluginInfo> {
        let guard = self.locks.lock(ExtensionKind::Plugin, slug).await;
        self.unload_guarded(&guard).await
    }

    /// [`unload`](Self::unload) for a caller already holding the slug's lock
    pub async fn unload_guarded(&self, guard: &SlugGuard) -> Option<LoadedPluginInfo> {
        if guard.kind() != ExtensionKind::Plugin {
            return None;
        }
        let slug = guard.slug();
        self.routes.remove_slug(slug).await;
        let removed = self.registry.write().await.remove(slug);
        if removed.is_some() {
            info!("Unloaded plugin '{}'", slug);
        }
        removed
    }

    pub async fn status(&self, slug: &str) -> Option<LoadedPluginInfo> {
        self.registry.read().await.get(slug).cloned()
    }

    /// Every recorded attempt, ordered by slug
    pub async fn statuses(&self) -> Vec<LoadedPluginInfo> {
        let mut all: Vec<_> = self.registry.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.slug.cmp(&b.slug));
        all
    }

    async fn read_manifest(&self, slug: &str) -> Result<PluginManifest> {
        if !is_valid_slug(slug) {
            return Err(LoaderError::not_installed(slug));
        }
        let dir = self.layout.plugin_dir(slug);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(LoaderError::not_installed(slug));
        }

        match load_manifest(&dir, ExtensionKind::Plugin).await {
            Ok(Manifest::Plugin(manifest)) if manifest.slug == slug => Ok(manifest),
            Ok(Manifest::Plugin(manifest)) => Err(LoaderError::invalid_manifest(
                slug,
                format!("manifest declares slug '{}'", manifest.slug),
            )),
            Ok(Manifest::Theme(_)) => Err(LoaderError::invalid_manifest(slug, "not a plugin manifest")),
            Err(e) => Err(LoaderError::invalid_manifest(slug, e.to_string())),
        }
    }

    async fn internal_target(
        &self,
        manifest: &PluginManifest,
        options: &LoadOptions,
    ) -> Result<Arc<dyn RouteTarget>> {
        let slug = manifest.slug.as_str();
        let entry = manifest.entry_module.as_deref().unwrap_or_default();
        let dir = self.layout.plugin_dir(slug);

        if !is_contained(Path::new(entry)) {
            return Err(LoaderError::entry_not_found(slug, entry));
        }
        let entry_path = dir.join(entry);
        let is_file = tokio::fs::metadata(&entry_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(LoaderError::entry_not_found(slug, entry));
        }
        debug!("Resolved entry module {:?} for '{}'", entry_path, slug);

        let plugin = self.catalog.get(slug).ok_or_else(|| {
            LoaderError::invalid_export(slug, "no internal registration is compiled into this host")
        })?;

        let mut router = PluginRouter::new();
        plugin.register(&mut router, &options.config)?;
        if router.is_empty() {
            return Err(LoaderError::invalid_export(slug, "registration added no routes"));
        }
        Ok(Arc::new(router))
    }

    fn external_target(&self, manifest: &PluginManifest) -> Result<Arc<dyn RouteTarget>> {
        let slug = manifest.slug.as_str();
        let raw = manifest.external_base_url.as_deref().unwrap_or_default();
        let invalid = |message: String| LoaderError::InvalidBaseUrl {
            slug: slug.to_string(),
            url: raw.to_string(),
            message,
        };

        let base = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
        }
        Ok(Arc::new(ProxyRoute::new(self.proxy.clone(), base)))
    }

    fn info(
        &self,
        manifest: &PluginManifest,
        status: LoadStatus,
        error: Option<String>,
        route_prefix: Option<String>,
    ) -> LoadedPluginInfo {
        LoadedPluginInfo {
            slug: manifest.slug.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            runtime_type: Some(manifest.runtime_type),
            status,
            error,
            route_prefix,
            loaded_at: Utc::now(),
        }
    }

    async fn record(&self, info: LoadedPluginInfo) {
        self.registry.write().await.insert(info.slug.clone(), info);
    }

    /// Record a failed attempt
    ///
    /// If the previous attachment is still mounted it stays `loaded` and
    /// carries the error; otherwise the slug is recorded as `failed`.
    async fn record_failure(
        &self,
        slug: &str,
        manifest: Option<&PluginManifest>,
        error: LoaderError,
    ) -> LoaderError {
        let still_mounted = !self.routes.prefixes_of(slug).await.is_empty();
        let mut registry = self.registry.write().await;

        if let Some(previous) = registry.get_mut(slug).filter(|p| still_mounted && p.is_loaded()) {
            warn!(
                "Reload of plugin '{}' failed, previous attachment keeps serving: {}",
                slug, error
            );
            previous.error = Some(error.to_string());
            return error;
        }

        warn!("Failed to load plugin '{}': {}", slug, error);
        let info = match manifest {
            Some(manifest) => self.info(manifest, LoadStatus::Failed, Some(error.to_string()), None),
            None => LoadedPluginInfo {
                slug: slug.to_string(),
                name: slug.to_string(),
                version: String::new(),
                runtime_type: None,
                status: LoadStatus::Failed,
                error: Some(error.to_string()),
                route_prefix: None,
                loaded_at: Utc::now(),
            },
        };
        registry.insert(slug.to_string(), info);
        error
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("root", &self.layout.root())
            .field("route_prefix", &self.route_prefix)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

/// Relative path that stays inside the plugin directory
fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
