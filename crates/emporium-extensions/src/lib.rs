//! Extension installation for Emporium
//!
//! This crate handles:
//! - Archive staging into unique scratch directories with guaranteed cleanup
//! - Manifest reading and kind-specific validation (`theme.json`, `manifest.json`)
//! - The installed-extension store (commit, metadata, reconstruction, removal)
//! - A per-kind installer producing typed installed records
//! - The `ExtensionInstaller` façade used by the admin surface
//!
//! Runtime attachment of plugins lives in `emporium-plugins`.

pub mod error;
pub mod installer;
pub mod kind_installer;
pub mod layout;
pub mod locks;
pub mod manifest;
pub mod staging;
pub mod store;
pub mod types;

pub use error::{ExtensionError, Result};
pub use installer::{ExtensionInstaller, InstallResult};
pub use kind_installer::{KindInstaller, PluginInstaller, ThemeInstaller};
pub use layout::{ExtensionLayout, INSTALLED_METADATA_FILE};
pub use locks::{SlugGuard, SlugLocks};
pub use manifest::{Manifest, PluginManifest, RawManifest, ThemeManifest};
pub use staging::{ArchiveStager, StagedArchive};
pub use store::ExtensionStore;
pub use types::{InstalledExtension, InstalledPlugin, InstalledRecord, InstalledTheme, RecordMeta};
