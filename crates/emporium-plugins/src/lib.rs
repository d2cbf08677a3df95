//! Plugin runtime loading for Emporium
//!
//! This crate handles:
//! - The live route table mounted under `/plugins/{slug}/api`
//! - Reverse proxying for `external-http` plugins
//! - The compiled-in catalog of `internal-fastify` plugins
//! - The loader and its registry of load attempts
//!
//! Nothing here touches installation; plugins are read from the on-disk
//! layout that `emporium-extensions` maintains.

pub mod builtin;
pub mod catalog;
pub mod error;
pub mod http;
pub mod loader;
pub mod proxy;
pub mod routes;
pub mod types;

pub use catalog::{InternalPlugin, InternalPluginCatalog};
pub use error::{LoaderError, ProxyError, Result};
pub use http::{PluginRequest, PluginResponse, PluginRouter};
pub use loader::PluginLoader;
pub use proxy::ReverseProxy;
pub use routes::{RouteTable, RouteTarget};
pub use types::{BulkMode, LoadOptions, LoadStatus, LoadedPluginInfo};
