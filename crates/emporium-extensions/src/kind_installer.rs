//! Per-kind installer
//!
//! Themes and plugins go through the same stage, validate, lock and commit
//! pipeline; they differ only in the record type produced. Installation
//! only puts a plugin on disk. Attaching it to the running service is the
//! runtime loader's job.

use crate::error::{ExtensionError, Result};
use crate::layout::ExtensionLayout;
use crate::locks::{SlugGuard, SlugLocks};
use crate::manifest::{find_manifest_root, load_manifest};
use crate::staging::ArchiveStager;
use crate::store::ExtensionStore;
use crate::types::{InstalledPlugin, InstalledRecord, InstalledTheme};
use emporium_core::{ExtensionKind, ExtensionSource};
use std::marker::PhantomData;
use tokio::io::AsyncRead;
use tracing::info;

/// Installs `theme.json` archives under `themes/{shop|admin}/{slug}`
pub type ThemeInstaller = KindInstaller<InstalledTheme>;

/// Installs `manifest.json` archives under `plugins/{slug}`
pub type PluginInstaller = KindInstaller<InstalledPlugin>;

#[derive(Debug)]
pub struct KindInstaller<R> {
    store: ExtensionStore,
    stager: ArchiveStager,
    locks: SlugLocks,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for KindInstaller<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            stager: self.stager.clone(),
            locks: self.locks.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: InstalledRecord> KindInstaller<R> {
    pub fn new(layout: ExtensionLayout, locks: SlugLocks) -> Self {
        Self {
            stager: ArchiveStager::new(layout.scratch_root()),
            store: ExtensionStore::new(layout),
            locks,
            _record: PhantomData,
        }
    }

    pub async fn install<Rd>(
        &self,
        kind: ExtensionKind,
        reader: Rd,
        source: ExtensionSource,
    ) -> Result<R>
    where
        Rd: AsyncRead + Unpin + Send,
    {
        let (record, _guard) = self.install_guarded(kind, reader, source).await?;
        Ok(record)
    }

    /// Install and keep the slug locked
    ///
    /// The returned guard lets the caller run a follow-up step (loading the
    /// plugin) before anyone else can touch the slug.
    pub async fn install_guarded<Rd>(
        &self,
        kind: ExtensionKind,
        reader: Rd,
        source: ExtensionSource,
    ) -> Result<(R, SlugGuard)>
    where
        Rd: AsyncRead + Unpin + Send,
    {
        let staged = self.stager.stage(reader).await?;
        let root = find_manifest_root(staged.path(), kind).await?;
        let manifest = load_manifest(&root, kind).await?;
        let version = manifest.version().to_string();

        let guard = self.locks.lock(kind, manifest.slug()).await;
        let record: R = self
            .store
            .commit(staged, &root, kind, manifest, source)
            .await?;

        info!("Installed {} '{}' v{}", kind, record.slug(), version);
        Ok((record, guard))
    }

    pub async fn get(&self, kind: ExtensionKind, slug: &str) -> Result<Option<R>> {
        self.store.get(kind, slug).await
    }

    pub async fn list(&self, kind: ExtensionKind) -> Result<Vec<R>> {
        self.store.list(kind).await
    }

    pub async fn uninstall(&self, kind: ExtensionKind, slug: &str) -> Result<()> {
        let guard = self.locks.lock(kind, slug).await;
        self.uninstall_guarded(&guard).await
    }

    /// Remove the extension the caller already holds the lock for
    pub async fn uninstall_guarded(&self, guard: &SlugGuard) -> Result<()> {
        self.store.remove(guard.kind(), guard.slug()).await?;
        info!("Uninstalled {} '{}'", guard.kind(), guard.slug());
        Ok(())
    }

    /// Like [`get`](Self::get) but absent is an error
    pub async fn require(&self, kind: ExtensionKind, slug: &str) -> Result<R> {
        self.get(kind, slug)
            .await?
            .ok_or_else(|| ExtensionError::not_installed(kind, slug))
    }
}
