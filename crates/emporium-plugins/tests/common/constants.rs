//! Test constants for emporium-plugins tests

#![allow(dead_code)]

pub const DEMO_PAY_SLUG: &str = "demo-pay";

/// Internal plugin registered by the test catalog
pub const REVIEWS_SLUG: &str = "reviews";

pub const REVIEWS_ENTRY: &str = "dist/index.js";

/// Proxy timeout used by fixtures
pub const PROXY_TIMEOUT_SECS: u64 = 1;

/// A local port nothing listens on
pub const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:9";
