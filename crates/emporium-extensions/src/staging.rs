//! Archive staging
//!
//! An uploaded zip is spooled into the scratch root, then extracted into a
//! directory whose name is unique for the life of the process. The returned
//! [`StagedArchive`] owns that directory: it is removed on drop unless the
//! store has moved it into place, so every failure path cleans up.

use crate::error::{ExtensionError, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::ZipArchive;

static STAGE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Extracts uploads into the scratch root
#[derive(Debug, Clone)]
pub struct ArchiveStager {
    scratch_root: PathBuf,
}

impl ArchiveStager {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Extract a zip byte stream into a fresh staging directory
    pub async fn stage<R>(&self, mut reader: R) -> Result<StagedArchive>
    where
        R: AsyncRead + Unpin + Send,
    {
        tokio::fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(|e| ExtensionError::staging_failed(&self.scratch_root, e))?;

        let name = unique_stage_name();
        let dir = self.scratch_root.join(&name);
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| ExtensionError::staging_failed(&dir, e))?;
        let staged = StagedArchive::new(dir.clone());

        let spool = self.scratch_root.join(format!("{}.upload", name));
        let spooled = spool_upload(&mut reader, &spool).await;
        let extracted = match spooled {
            Ok(bytes) => {
                debug!("Spooled {} byte upload to {:?}", bytes, spool);
                let (archive, dest) = (spool.clone(), dir.clone());
                tokio::task::spawn_blocking(move || extract_zip(&archive, &dest))
                    .await
                    .map_err(|e| ExtensionError::staging_failed(&dir, io::Error::other(e)))
                    .and_then(|r| r)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = tokio::fs::remove_file(&spool).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove upload spool {:?}: {}", spool, e);
            }
        }

        let entries = extracted?;
        info!("Staged archive with {} entries at {:?}", entries, staged.path());
        Ok(staged)
    }

    /// Best-effort recursive removal of a staging directory
    ///
    /// Failures are logged, never returned.
    pub async fn cleanup(path: &Path) {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => debug!("Removed staging directory {:?}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staging directory {:?}: {}", path, e),
        }
    }

    /// Remove everything under the scratch root (safe between restarts)
    pub async fn clear_scratch(&self) {
        if !self.scratch_root.exists() {
            return;
        }
        info!("Clearing scratch root {:?}", self.scratch_root);
        Self::cleanup(&self.scratch_root).await;
    }
}

/// A staging directory that is removed unless committed
#[derive(Debug)]
pub struct StagedArchive {
    dir: PathBuf,
    armed: bool,
}

impl StagedArchive {
    fn new(dir: PathBuf) -> Self {
        Self { dir, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Remove whatever is left of the staging directory
    ///
    /// Called after a commit has moved the extension out (only the wrapper
    /// directory of a nested archive may remain) and on explicit aborts.
    pub async fn discard(mut self) {
        self.armed = false;
        ArchiveStager::cleanup(&self.dir).await;
    }
}

impl Drop for StagedArchive {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("Cleaned up staging directory {:?}", self.dir),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up staging directory {:?}: {}", self.dir, e),
        }
    }
}

/// Monotonic timestamp, process sequence and random suffix
fn unique_stage_name() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = STAGE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("stage-{}-{}-{}", nanos, seq, &suffix[..8])
}

async fn spool_upload<R>(reader: &mut R, spool: &Path) -> Result<u64>
where
    R: AsyncRead + Unpin + Send,
{
    let mut file = tokio::fs::File::create(spool)
        .await
        .map_err(|e| ExtensionError::staging_failed(spool, e))?;
    let bytes = tokio::io::copy(reader, &mut file)
        .await
        .map_err(|e| ExtensionError::staging_failed(spool, e))?;
    file.flush()
        .await
        .map_err(|e| ExtensionError::staging_failed(spool, e))?;
    Ok(bytes)
}

/// Extract every safe entry of a zip file into `dest`
///
/// Entries escaping `dest` and symlinks are skipped.
fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .map_err(|e| ExtensionError::staging_failed(archive_path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| ExtensionError::archive_invalid(format!("not a zip archive: {}", e)))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtensionError::archive_invalid(format!("unreadable entry {}: {}", i, e)))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping archive entry with unsafe path: {}", entry.name());
            continue;
        };
        if entry
            .unix_mode()
            .is_some_and(|mode| mode & 0o170000 == 0o120000)
        {
            warn!("Skipping symlink archive entry: {}", entry.name());
            continue;
        }

        let out = dest.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| ExtensionError::staging_failed(&out, e))?;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtensionError::staging_failed(parent, e))?;
        }
        let mut out_file =
            File::create(&out).map_err(|e| ExtensionError::staging_failed(&out, e))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
                ExtensionError::archive_invalid(format!("corrupt entry {}: {}", relative.display(), e))
            }
            _ => ExtensionError::staging_failed(&out, e),
        })?;
        extracted += 1;
    }

    Ok(extracted)
}
