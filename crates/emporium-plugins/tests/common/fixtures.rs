//! Fixtures wiring an installer and a loader to one extensions root

#![allow(dead_code)]

use super::constants::*;
use axum::body::Body;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use emporium_core::config::ProxyConfig;
use emporium_core::{ExtensionKind, ExtensionSource};
use emporium_extensions::{ExtensionInstaller, SlugLocks};
use emporium_plugins::{
    InternalPlugin, InternalPluginCatalog, PluginLoader, PluginResponse, PluginRouter,
    ReverseProxy, RouteTable,
};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Internal plugin echoing its configuration
pub struct ReviewsPlugin;

impl InternalPlugin for ReviewsPlugin {
    fn slug(&self) -> &str {
        REVIEWS_SLUG
    }

    fn register(&self, router: &mut PluginRouter, config: &Value) -> emporium_plugins::Result<()> {
        let config = config.clone();
        router.get("/", move |_| {
            let config = config.clone();
            async move { PluginResponse::json(StatusCode::OK, &json!({ "config": config })) }
        });
        Ok(())
    }
}

pub struct PluginEnv {
    pub temp: TempDir,
    pub installer: ExtensionInstaller,
    pub loader: PluginLoader,
}

impl PluginEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let locks = SlugLocks::new();
        let installer = ExtensionInstaller::new(temp.path().join("extensions"), locks.clone());

        let mut catalog = InternalPluginCatalog::new();
        catalog.register(ReviewsPlugin);

        let proxy = ReverseProxy::new(&ProxyConfig {
            timeout_secs: PROXY_TIMEOUT_SECS,
            connect_timeout_secs: PROXY_TIMEOUT_SECS,
            ..ProxyConfig::default()
        })
        .unwrap();

        let loader = PluginLoader::new(
            installer.layout().clone(),
            RouteTable::new(),
            catalog,
            proxy,
            locks,
        );
        Self {
            temp,
            installer,
            loader,
        }
    }

    pub async fn install(&self, archive: Vec<u8>) {
        self.installer
            .install(ExtensionKind::Plugin, &archive[..], ExtensionSource::LocalZip)
            .await
            .unwrap();
    }

    /// Send a request through the live route table
    pub async fn request(&self, method: Method, uri: &str, body: &str) -> Option<Response> {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.loader.routes().dispatch(request).await
    }
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn plugin_archive(manifest: Value, files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("manifest.json", options).unwrap();
    writer
        .write_all(&serde_json::to_vec(&manifest).unwrap())
        .unwrap();
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn external_archive(slug: &str, base_url: &str) -> Vec<u8> {
    plugin_archive(
        json!({
            "slug": slug,
            "name": "Demo Pay",
            "version": "1.0.0",
            "runtimeType": "external-http",
            "externalBaseUrl": base_url
        }),
        &[],
    )
}

pub fn internal_archive(slug: &str, with_entry: bool) -> Vec<u8> {
    let manifest = json!({
        "slug": slug,
        "name": "Reviews",
        "version": "2.0.0",
        "runtimeType": "internal-fastify",
        "entryModule": REVIEWS_ENTRY
    });
    if with_entry {
        plugin_archive(manifest, &[(REVIEWS_ENTRY, "export default async function register() {}")])
    } else {
        plugin_archive(manifest, &[("README.md", "entry intentionally missing")])
    }
}
