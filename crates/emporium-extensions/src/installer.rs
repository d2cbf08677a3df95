//! Extension installer façade
//!
//! The single entry point for admin routes, the CLI and marketplace installs.
//! Dispatches on [`ExtensionKind`] and normalizes the result so callers never
//! branch on kind themselves.

use crate::error::Result;
use crate::layout::ExtensionLayout;
use crate::kind_installer::{PluginInstaller, ThemeInstaller};
use crate::locks::{SlugGuard, SlugLocks};
use crate::staging::ArchiveStager;
use crate::types::InstalledExtension;
use emporium_core::{ExtensionKind, ExtensionSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncRead;

/// Kind-independent summary of a successful install
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub kind: ExtensionKind,
    pub slug: String,
    pub version: String,
    pub source: ExtensionSource,
    pub fs_path: PathBuf,
}

impl InstallResult {
    fn from_installed(kind: ExtensionKind, installed: &InstalledExtension) -> Self {
        Self {
            kind,
            slug: installed.slug().to_string(),
            version: installed.version().to_string(),
            source: installed.source(),
            fs_path: installed.fs_path().to_path_buf(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionInstaller {
    layout: ExtensionLayout,
    locks: SlugLocks,
    themes: ThemeInstaller,
    plugins: PluginInstaller,
}

impl ExtensionInstaller {
    /// Installer rooted at `root`, sharing `locks` with the plugin loader
    pub fn new(root: impl Into<PathBuf>, locks: SlugLocks) -> Self {
        let layout = ExtensionLayout::new(root);
        Self {
            themes: ThemeInstaller::new(layout.clone(), locks.clone()),
            plugins: PluginInstaller::new(layout.clone(), locks.clone()),
            layout,
            locks,
        }
    }

    pub fn layout(&self) -> &ExtensionLayout {
        &self.layout
    }

    pub async fn install<R>(
        &self,
        kind: ExtensionKind,
        reader: R,
        source: ExtensionSource,
    ) -> Result<InstallResult>
    where
        R: AsyncRead + Unpin + Send,
    {
        let (result, _guard) = self.install_guarded(kind, reader, source).await?;
        Ok(result)
    }

    /// Install and return with the slug still locked
    ///
    /// Hand the guard to the plugin loader to attach the new install before
    /// a concurrent uninstall or reinstall can run.
    pub async fn install_guarded<R>(
        &self,
        kind: ExtensionKind,
        reader: R,
        source: ExtensionSource,
    ) -> Result<(InstallResult, SlugGuard)>
    where
        R: AsyncRead + Unpin + Send,
    {
        let (installed, guard): (InstalledExtension, SlugGuard) = match kind.theme_target() {
            Some(_) => {
                let (theme, guard) = self.themes.install_guarded(kind, reader, source).await?;
                (theme.into(), guard)
            }
            None => {
                let (plugin, guard) = self.plugins.install_guarded(kind, reader, source).await?;
                (plugin.into(), guard)
            }
        };
        Ok((InstallResult::from_installed(kind, &installed), guard))
    }

    /// Take the per-slug lock shared with the plugin loader
    pub async fn lock(&self, kind: ExtensionKind, slug: &str) -> SlugGuard {
        self.locks.lock(kind, slug).await
    }

    pub async fn uninstall(&self, kind: ExtensionKind, slug: &str) -> Result<()> {
        let guard = self.lock(kind, slug).await;
        self.uninstall_guarded(&guard).await
    }

    pub async fn uninstall_guarded(&self, guard: &SlugGuard) -> Result<()> {
        match guard.kind().theme_target() {
            Some(_) => self.themes.uninstall_guarded(guard).await,
            None => self.plugins.uninstall_guarded(guard).await,
        }
    }

    pub async fn get(&self, kind: ExtensionKind, slug: &str) -> Result<Option<InstalledExtension>> {
        Ok(match kind.theme_target() {
            Some(_) => self.themes.get(kind, slug).await?.map(Into::into),
            None => self.plugins.get(kind, slug).await?.map(Into::into),
        })
    }

    pub async fn list(&self, kind: ExtensionKind) -> Result<Vec<InstalledExtension>> {
        Ok(match kind.theme_target() {
            Some(_) => self
                .themes
                .list(kind)
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
            None => self
                .plugins
                .list(kind)
                .await?
                .into_iter()
                .map(Into::into)
                .collect(),
        })
    }

    /// Empty the scratch root; only safe before any install is in flight
    pub async fn clear_scratch(&self) {
        ArchiveStager::new(self.layout.scratch_root())
            .clear_scratch()
            .await;
    }
}
