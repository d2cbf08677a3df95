//! Command implementations

pub mod config;
pub mod extension;
pub mod plugin;
pub mod serve;
