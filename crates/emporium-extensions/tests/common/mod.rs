//! Common test utilities for emporium-extensions
//!
//! This module provides shared test infrastructure including:
//! - Constants for manifests and slugs
//! - Archive builders producing in-memory zip uploads
//! - Fixtures wiring an installer to a temporary extensions root
//! - Assertion helpers for on-disk state

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod builders;
pub mod constants;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use constants::*;
pub use fixtures::*;
