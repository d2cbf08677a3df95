//! Installed-extension store
//!
//! Commit replaces whatever is installed at the derived path with the staged
//! content in one rename, then writes `.installed.json`. The previous install
//! is moved aside into the scratch root first and only deleted once the new
//! one is complete, so a failed commit restores it. Mutations hold an
//! advisory lock on `.install.lock` for the duration.

use crate::error::{ExtensionError, Result};
use crate::layout::{ExtensionLayout, INSTALLED_METADATA_FILE};
use crate::manifest::{self, Manifest};
use crate::staging::StagedArchive;
use crate::types::{InstalledRecord, RecordMeta};
use emporium_core::{is_valid_slug, ExtensionKind, ExtensionSource};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ExtensionStore {
    layout: ExtensionLayout,
}

impl ExtensionStore {
    pub fn new(layout: ExtensionLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ExtensionLayout {
        &self.layout
    }

    /// Move a validated staged extension into place and record it
    ///
    /// `content_dir` is the extension root inside `staged` (the staging
    /// directory itself, or its single wrapper directory).
    pub async fn commit<R: InstalledRecord>(
        &self,
        staged: StagedArchive,
        content_dir: &Path,
        kind: ExtensionKind,
        manifest: Manifest,
        source: ExtensionSource,
    ) -> Result<R> {
        let slug = manifest.slug().to_string();
        let target = self.layout.extension_dir(kind, &slug);
        let record = R::from_manifest(manifest, kind, RecordMeta::fresh(source, &target))?;
        let metadata = serde_json::to_vec_pretty(&record).map_err(|e| {
            ExtensionError::commit_failed(&target, io::Error::new(io::ErrorKind::InvalidData, e))
        })?;

        let layout = self.layout.clone();
        let content = content_dir.to_path_buf();
        let dest = target.clone();
        let committed =
            tokio::task::spawn_blocking(move || commit_blocking(&layout, &content, &dest, &metadata))
                .await
                .map_err(|e| ExtensionError::commit_failed(&target, io::Error::other(e)))
                .and_then(|r| r);

        staged.discard().await;
        committed?;

        info!("Committed {} '{}' to {:?}", kind, slug, target);
        Ok(record)
    }

    /// Read an installed record, rebuilding it from the manifest if needed
    ///
    /// `Ok(None)` means nothing is installed under `slug`. A directory that
    /// exists but yields neither metadata nor a valid manifest is `Corrupted`.
    pub async fn get<R: InstalledRecord>(&self, kind: ExtensionKind, slug: &str) -> Result<Option<R>> {
        if !is_valid_slug(slug) {
            return Ok(None);
        }
        let dir = self.layout.extension_dir(kind, slug);
        let dir_meta = match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => meta,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ExtensionError::corrupted(kind, slug, e.to_string())),
        };

        match read_metadata::<R>(&dir).await {
            Some(mut record) if record.slug() == slug => {
                record.set_fs_path(dir);
                return Ok(Some(record));
            }
            Some(_) => debug!("Metadata slug mismatch under {:?}, rebuilding from manifest", dir),
            None => debug!("No usable metadata under {:?}, rebuilding from manifest", dir),
        }

        let manifest = manifest::load_manifest(&dir, kind)
            .await
            .map_err(|e| ExtensionError::corrupted(kind, slug, e.to_string()))?;
        if manifest.slug() != slug {
            return Err(ExtensionError::corrupted(
                kind,
                slug,
                format!("manifest declares slug '{}'", manifest.slug()),
            ));
        }

        let meta = RecordMeta::reconstructed(kind, slug, &dir, &dir_meta);
        R::from_manifest(manifest, kind, meta)
            .map(Some)
            .map_err(|e| ExtensionError::corrupted(kind, slug, e.to_string()))
    }

    /// Every readable install of `kind`, ordered by slug
    pub async fn list<R: InstalledRecord>(&self, kind: ExtensionKind) -> Result<Vec<R>> {
        let mut records = Vec::new();
        for slug in self.installed_slugs(kind).await? {
            match self.get::<R>(kind, &slug).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping {} '{}': {}", kind, slug, e),
            }
        }
        Ok(records)
    }

    /// Names of the immediate subdirectories under the kind's root
    ///
    /// Dot-directories and names that are not valid slugs are skipped.
    pub async fn installed_slugs(&self, kind: ExtensionKind) -> Result<Vec<String>> {
        let root = self.layout.kind_root(kind);
        let mut entries = match tokio::fs::read_dir(&root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ExtensionError::read_failed(&root, e)),
        };

        let mut slugs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ExtensionError::read_failed(&root, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !is_valid_slug(&name) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                slugs.push(name);
            }
        }
        slugs.sort();
        Ok(slugs)
    }

    /// Delete an installed extension
    pub async fn remove(&self, kind: ExtensionKind, slug: &str) -> Result<()> {
        if !is_valid_slug(slug) {
            return Err(ExtensionError::not_installed(kind, slug));
        }
        let dir = self.layout.extension_dir(kind, slug);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(ExtensionError::not_installed(kind, slug));
        }

        let lock_path = self.layout.lock_file();
        let target = dir.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let _lock = InstallLock::acquire(&lock_path)?;
            fs::remove_dir_all(&target).map_err(|e| ExtensionError::commit_failed(&target, e))
        })
        .await
        .map_err(|e| ExtensionError::commit_failed(&dir, io::Error::other(e)))??;

        info!("Removed {} '{}' from {:?}", kind, slug, dir);
        Ok(())
    }
}

/// Parse `.installed.json`; any failure means "fall back to the manifest"
async fn read_metadata<R: InstalledRecord>(dir: &Path) -> Option<R> {
    let path = dir.join(INSTALLED_METADATA_FILE);
    let content = tokio::fs::read(&path).await.ok()?;
    match serde_json::from_slice(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Ignoring unreadable metadata {:?}: {}", path, e);
            None
        }
    }
}

/// Exclusive advisory lock on the layout's lock file, released on drop
struct InstallLock {
    _file: File,
}

impl InstallLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtensionError::commit_failed(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| ExtensionError::commit_failed(path, e))?;
        file.lock_exclusive()
            .map_err(|e| ExtensionError::commit_failed(path, e))?;
        Ok(Self { _file: file })
    }
}

fn commit_blocking(
    layout: &ExtensionLayout,
    content: &Path,
    target: &Path,
    metadata: &[u8],
) -> Result<()> {
    let _lock = InstallLock::acquire(&layout.lock_file())?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| ExtensionError::commit_failed(parent, e))?;
    }

    let previous = if target.exists() {
        let aside = layout.scratch_root().join(format!(
            "replaced-{}",
            uuid::Uuid::new_v4().simple()
        ));
        fs::create_dir_all(layout.scratch_root())
            .map_err(|e| ExtensionError::commit_failed(layout.scratch_root(), e))?;
        fs::rename(target, &aside).map_err(|e| ExtensionError::commit_failed(target, e))?;
        debug!("Moved previous install {:?} aside to {:?}", target, aside);
        Some(aside)
    } else {
        None
    };

    let result = move_into_place(content, target).and_then(|()| write_metadata(target, metadata));

    match (result, previous) {
        (Ok(()), Some(aside)) => {
            if let Err(e) = fs::remove_dir_all(&aside) {
                warn!("Failed to remove replaced install {:?}: {}", aside, e);
            }
            Ok(())
        }
        (Ok(()), None) => Ok(()),
        (Err(e), previous) => {
            warn!("Commit to {:?} failed, rolling back: {}", target, e);
            if target.exists() {
                if let Err(rm) = fs::remove_dir_all(target) {
                    error!("Failed to remove partial install {:?}: {}", target, rm);
                }
            }
            if let Some(aside) = previous {
                if let Err(mv) = fs::rename(&aside, target) {
                    error!("Failed to restore previous install {:?} from {:?}: {}", target, aside, mv);
                }
            }
            Err(e)
        }
    }
}

/// Single rename, or copy-then-delete across devices
fn move_into_place(content: &Path, target: &Path) -> Result<()> {
    match fs::rename(content, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("Rename across devices, copying {:?} to {:?}", content, target);
            copy_into_place(content, target)
        }
        Err(e) => Err(ExtensionError::commit_failed(target, e)),
    }
}

/// Copy `content` to `target`, leaving no partial `target` behind on failure
fn copy_into_place(content: &Path, target: &Path) -> Result<()> {
    if let Err(copy_err) = copy_dir(content, target) {
        if let Err(rm) = fs::remove_dir_all(target) {
            warn!("Failed to remove partial copy {:?}: {}", target, rm);
        }
        return Err(ExtensionError::commit_failed(target, copy_err));
    }
    if let Err(rm) = fs::remove_dir_all(content) {
        warn!("Failed to remove staged copy {:?}: {}", content, rm);
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let dest: PathBuf = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Write-then-rename so a reader never sees half a metadata file
fn write_metadata(dir: &Path, metadata: &[u8]) -> Result<()> {
    let tmp = dir.join(format!("{}.tmp", INSTALLED_METADATA_FILE));
    let path = dir.join(INSTALLED_METADATA_FILE);
    fs::write(&tmp, metadata).map_err(|e| ExtensionError::commit_failed(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| ExtensionError::commit_failed(&path, e))
}
