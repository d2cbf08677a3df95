//! Common test utilities for emporium-plugins
//!
//! This module provides shared test infrastructure including:
//! - Constants for slugs and timeouts
//! - Archive builders and an installer-backed fixture
//! - A test internal plugin registered in the catalog

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod constants;
pub mod fixtures;

pub use constants::*;
pub use fixtures::*;
