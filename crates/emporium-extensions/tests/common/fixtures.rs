//! Test fixtures wiring installers to a temporary extensions root

#![allow(dead_code)]

use emporium_extensions::{ExtensionInstaller, ExtensionLayout, SlugLocks};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An installer over a fresh, empty extensions root
pub struct TestEnv {
    pub temp: TempDir,
    pub installer: ExtensionInstaller,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let installer = ExtensionInstaller::new(temp.path().join("extensions"), SlugLocks::new());
        Self { temp, installer }
    }

    pub fn root(&self) -> PathBuf {
        self.temp.path().join("extensions")
    }

    pub fn layout(&self) -> &ExtensionLayout {
        self.installer.layout()
    }
}

/// Sorted relative file paths under `dir`
pub fn tree(dir: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                out.push(
                    path.strip_prefix(base)
                        .unwrap()
                        .to_string_lossy()
                        .replace('\\', "/"),
                );
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}
