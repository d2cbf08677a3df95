//! Archive builders for creating test uploads
//!
//! Provides a fluent builder producing zip bytes with a manifest and
//! arbitrary extra entries.

#![allow(dead_code)]

use super::constants::*;
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builder for zip archives as they would be uploaded
pub struct ArchiveBuilder {
    manifest_file: Option<String>,
    manifest: Value,
    files: Vec<(String, Vec<u8>)>,
    directories: Vec<String>,
    wrapper: Option<String>,
}

impl ArchiveBuilder {
    /// Theme archive with a valid `theme.json`
    pub fn theme(slug: &str) -> Self {
        Self {
            manifest_file: Some("theme.json".to_string()),
            manifest: json!({
                "slug": slug,
                "name": "Test Theme",
                "version": TEST_VERSION,
                "category": "fashion",
                "author": "Emporium Tests"
            }),
            files: Vec::new(),
            directories: Vec::new(),
            wrapper: None,
        }
    }

    /// Plugin archive proxied to an external service
    pub fn external_plugin(slug: &str, base_url: &str) -> Self {
        Self {
            manifest_file: Some("manifest.json".to_string()),
            manifest: json!({
                "slug": slug,
                "name": "Demo Pay",
                "version": TEST_VERSION,
                "runtimeType": "external-http",
                "externalBaseUrl": base_url
            }),
            files: Vec::new(),
            directories: Vec::new(),
            wrapper: None,
        }
    }

    /// Plugin archive served in-process
    pub fn internal_plugin(slug: &str, entry_module: &str) -> Self {
        Self {
            manifest_file: Some("manifest.json".to_string()),
            manifest: json!({
                "slug": slug,
                "name": "Internal Plugin",
                "version": TEST_VERSION,
                "runtimeType": "internal-fastify",
                "entryModule": entry_module
            }),
            files: Vec::new(),
            directories: Vec::new(),
            wrapper: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.manifest["version"] = json!(version);
        self
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.manifest[key] = value;
        self
    }

    pub fn without_field(mut self, key: &str) -> Self {
        if let Some(fields) = self.manifest.as_object_mut() {
            fields.remove(key);
        }
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.manifest_file = None;
        self
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.as_bytes().to_vec()));
        self
    }

    /// Add an empty directory entry
    pub fn with_directory(mut self, path: &str) -> Self {
        self.directories.push(path.to_string());
        self
    }

    /// Nest every entry under one top-level directory
    pub fn wrapped_in(mut self, dir: &str) -> Self {
        self.wrapper = Some(dir.to_string());
        self
    }

    fn entry_name(&self, path: &str) -> String {
        match &self.wrapper {
            Some(dir) => format!("{}/{}", dir, path),
            None => path.to_string(),
        }
    }

    pub fn build(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        if let Some(file) = &self.manifest_file {
            let body = serde_json::to_vec_pretty(&self.manifest).unwrap();
            writer.start_file(self.entry_name(file), options).unwrap();
            writer.write_all(&body).unwrap();
        }
        for dir in &self.directories {
            writer.add_directory(self.entry_name(dir), options).unwrap();
        }
        for (path, content) in &self.files {
            writer.start_file(self.entry_name(path), options).unwrap();
            writer.write_all(content).unwrap();
        }

        writer.finish().unwrap().into_inner()
    }
}
