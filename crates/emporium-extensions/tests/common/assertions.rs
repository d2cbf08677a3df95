//! Assertion helpers for on-disk install state

#![allow(dead_code)]

use emporium_extensions::INSTALLED_METADATA_FILE;
use std::path::Path;

/// Assert that the scratch root holds nothing
pub fn assert_scratch_empty(scratch_root: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(scratch_root)
        .map(|d| d.flatten().map(|e| e.file_name()).collect())
        .unwrap_or_default();
    assert!(
        leftovers.is_empty(),
        "Scratch root {:?} not empty: {:?}",
        scratch_root,
        leftovers
    );
}

/// Assert that an install directory is complete: present with readable metadata
pub fn assert_fully_installed(dir: &Path) {
    assert!(dir.is_dir(), "Expected install directory {:?}", dir);
    let meta = dir.join(INSTALLED_METADATA_FILE);
    let content = std::fs::read(&meta)
        .unwrap_or_else(|e| panic!("Missing metadata {:?}: {}", meta, e));
    serde_json::from_slice::<serde_json::Value>(&content)
        .unwrap_or_else(|e| panic!("Unparseable metadata {:?}: {}", meta, e));
}

pub fn assert_not_installed(dir: &Path) {
    assert!(!dir.exists(), "Expected {:?} to be absent", dir);
}
