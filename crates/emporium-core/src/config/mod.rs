//! Configuration for the Emporium extension host

mod loader;
mod types;

pub use loader::HierarchicalConfigLoader;
pub use types::{EmporiumConfig, LoaderConfig, PluginSettings, ProxyConfig, ServerConfig};
