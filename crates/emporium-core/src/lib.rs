//! # emporium-core
//!
//! Core library for the Emporium extension host providing:
//! - Configuration loading (embedded defaults, `emporium.yaml`, `EMPORIUM_*` env)
//! - Shared type definitions for extension kinds, sources, and plugin runtimes
//! - Slug rules shared by the installer and the plugin loader

pub mod config;
pub mod error;
pub mod types;

pub use config::{EmporiumConfig, HierarchicalConfigLoader};
pub use error::{Error, Result};
pub use types::{is_valid_slug, ExtensionKind, ExtensionSource, RuntimeType, ThemeTarget};
