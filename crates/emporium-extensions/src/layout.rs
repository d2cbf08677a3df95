//! On-disk layout of installed extensions
//!
//! ```text
//! {root}/themes/shop/{slug}/    theme-shop installs
//! {root}/themes/admin/{slug}/   theme-admin installs
//! {root}/plugins/{slug}/        plugin installs
//! {root}/.tmp/                  scratch root for in-progress extractions
//! {root}/.install.lock          advisory lock taken around commit/delete
//! ```
//!
//! Every install path is derived from kind + slug; nothing else decides where
//! an extension lives.

use emporium_core::{ExtensionKind, ThemeTarget};
use std::path::{Path, PathBuf};

/// Metadata file written inside every installed extension directory
pub const INSTALLED_METADATA_FILE: &str = ".installed.json";

const SCRATCH_DIR: &str = ".tmp";
const LOCK_FILE: &str = ".install.lock";

#[derive(Debug, Clone)]
pub struct ExtensionLayout {
    root: PathBuf,
}

impl ExtensionLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn themes_root(&self, target: ThemeTarget) -> PathBuf {
        self.root.join("themes").join(target.as_str())
    }

    pub fn plugins_root(&self) -> PathBuf {
        self.root.join("plugins")
    }

    /// Directory holding every install of `kind`
    pub fn kind_root(&self, kind: ExtensionKind) -> PathBuf {
        match kind.theme_target() {
            Some(target) => self.themes_root(target),
            None => self.plugins_root(),
        }
    }

    /// Deterministic install location; callers must have validated `slug`
    pub fn extension_dir(&self, kind: ExtensionKind, slug: &str) -> PathBuf {
        self.kind_root(kind).join(slug)
    }

    pub fn plugin_dir(&self, slug: &str) -> PathBuf {
        self.extension_dir(ExtensionKind::Plugin, slug)
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.root.join(SCRATCH_DIR)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}
