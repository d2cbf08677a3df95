//! Test constants for emporium-extensions tests

#![allow(dead_code)]

/// Default theme slug used across tests
pub const TEST_THEME_SLUG: &str = "aurora";

/// Default plugin slug used across tests
pub const TEST_PLUGIN_SLUG: &str = "demo-pay";

pub const TEST_VERSION: &str = "1.0.0";

pub const UPGRADE_VERSION: &str = "1.1.0";

pub const EXTERNAL_BASE_URL: &str = "https://example.test";

/// Slugs that must never reach the filesystem
pub const HOSTILE_SLUGS: &[&str] = &["../escape", "a/b", "Aurora", "with space", "snake_case", ".."];
