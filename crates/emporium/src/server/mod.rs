//! Administrative HTTP server
//!
//! Admin routes sit behind the [`AdminGate`]; every other path falls through
//! to the live plugin route table.

mod error;
mod gate;
mod handlers;

pub use gate::{AdminGate, TokenGate};

use crate::host::Host;
use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use emporium_plugins::BulkMode;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub host: Arc<Host>,
    pub gate: Arc<dyn AdminGate>,
}

/// Startup work before accepting requests
pub async fn prepare(host: &Host) -> Result<()> {
    if host.config.loader.clear_scratch_on_start {
        host.installer.clear_scratch().await;
    }
    if host.config.loader.load_on_start {
        let loaded = host.load_plugins(BulkMode::SkipOnError).await?;
        info!(
            "{} of {} plugin(s) attached",
            loaded.iter().filter(|p| p.is_loaded()).count(),
            loaded.len()
        );
    }
    Ok(())
}

pub fn router(host: Host) -> Router {
    let gate = Arc::new(TokenGate::from_config(&host.config.server));
    router_with_gate(host, gate)
}

pub fn router_with_gate(host: Host, gate: Arc<dyn AdminGate>) -> Router {
    let upload_limit = host.config.server.max_upload_bytes;
    let state = AppState {
        host: Arc::new(host),
        gate,
    };

    Router::new()
        .route("/extensions/{kind}", get(handlers::list_extensions))
        .route(
            "/extensions/{kind}/install",
            post(handlers::install_extension)
                .get(handlers::get_install_slug)
                .delete(handlers::uninstall_install_slug),
        )
        .route(
            "/extensions/{kind}/{slug}",
            get(handlers::get_extension).delete(handlers::uninstall_extension),
        )
        .route("/plugins/runtime", get(handlers::runtime_status))
        .route("/plugins/{slug}/load", post(handlers::load_plugin))
        .route("/plugins/{slug}/unload", post(handlers::unload_plugin))
        .route_layer(middleware::from_fn_with_state(state.clone(), gate::require_admin))
        .layer(DefaultBodyLimit::max(upload_limit))
        .fallback(handlers::dispatch_plugin)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use emporium_core::{EmporiumConfig, ExtensionKind, ExtensionSource};
    use emporium_core::config::PluginSettings;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const ANNOUNCEMENT: &str = "Free shipping this week";

    fn zip_bytes(manifest_file: &str, manifest: Value, files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file(manifest_file, options).unwrap();
        writer.write_all(&serde_json::to_vec(&manifest).unwrap()).unwrap();
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn announcements_archive() -> Vec<u8> {
        zip_bytes(
            "manifest.json",
            json!({
                "slug": "announcements",
                "name": "Announcements",
                "version": "1.0.0",
                "runtimeType": "internal-fastify",
                "entryModule": "index.js"
            }),
            &[("index.js", "module.exports = async function register() {}")],
        )
    }

    fn theme_archive(slug: &str) -> Vec<u8> {
        zip_bytes(
            "theme.json",
            json!({"slug": slug, "name": "Aurora", "version": "1.2.0"}),
            &[("assets/site.css", "body {}")],
        )
    }

    fn test_config(temp: &TempDir) -> EmporiumConfig {
        let mut config = EmporiumConfig::default();
        config.extensions_root =
            Utf8PathBuf::from_path_buf(temp.path().join("extensions")).unwrap();
        config.plugins.insert(
            "announcements".to_string(),
            PluginSettings {
                config: json!({ "messages": [ANNOUNCEMENT] }),
                ..PluginSettings::default()
            },
        );
        config
    }

    async fn spawn(host: Host) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(host);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn install(base: &str, kind: &str, archive: Vec<u8>) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/extensions/{}/install", base, kind))
            .header("content-type", "application/zip")
            .body(archive)
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_installed_plugin_serves_routes_immediately() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;

        let response = install(&base, "plugin", announcements_archive()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["slug"], "announcements");
        assert_eq!(body["version"], "1.0.0");
        assert!(body["fsPath"].as_str().unwrap().ends_with("plugins/announcements"));

        let runtime: Value = reqwest::get(format!("{}/plugins/runtime", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(runtime[0]["slug"], "announcements");
        assert_eq!(runtime[0]["status"], "loaded");

        let latest: Value = reqwest::get(format!("{}/plugins/announcements/api/latest", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(latest["message"], ANNOUNCEMENT);
    }

    #[tokio::test]
    async fn test_install_rejects_unknown_kind_and_non_zip() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;

        let response = install(&base, "widget", theme_archive("aurora")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("widget"));

        let response = install(&base, "theme-shop", b"definitely not a zip".to_vec()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!temp.path().join("extensions/themes/shop").exists());
    }

    #[tokio::test]
    async fn test_invalid_manifest_reports_reason_as_server_error() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;

        let archive = zip_bytes("theme.json", json!({"slug": "aurora", "name": "Aurora"}), &[]);
        let response = install(&base, "theme-shop", archive).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("version"));
    }

    #[tokio::test]
    async fn test_get_list_and_delete_statuses() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;
        let client = reqwest::Client::new();
        let item = format!("{}/extensions/theme-shop/aurora", base);

        assert_eq!(client.get(&item).send().await.unwrap().status(), StatusCode::NOT_FOUND);
        let response = client.delete(&item).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = install(&base, "theme-shop", theme_archive("aurora")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let theme: Value = client.get(&item).send().await.unwrap().json().await.unwrap();
        assert_eq!(theme["slug"], "aurora");
        assert_eq!(theme["target"], "shop");

        let listed: Vec<Value> = client
            .get(format!("{}/extensions/theme-shop", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        let deleted: Value = client.delete(&item).send().await.unwrap().json().await.unwrap();
        assert_eq!(deleted["success"], true);
        assert_eq!(client.get(&item).send().await.unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_slug_named_install_is_reachable() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;
        let client = reqwest::Client::new();
        let item = format!("{}/extensions/theme-shop/install", base);

        assert_eq!(client.get(&item).send().await.unwrap().status(), StatusCode::NOT_FOUND);

        let response = install(&base, "theme-shop", theme_archive("install")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = client.get(&item).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let theme: Value = response.json().await.unwrap();
        assert_eq!(theme["slug"], "install");

        let response = client.delete(&item).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let deleted: Value = response.json().await.unwrap();
        assert_eq!(deleted["success"], true);
        assert_eq!(client.get(&item).send().await.unwrap().status(), StatusCode::NOT_FOUND);
        assert!(!temp.path().join("extensions/themes/shop/install").exists());
    }

    #[tokio::test]
    async fn test_racing_install_and_delete_leave_runtime_consistent() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;
        let client = reqwest::Client::new();

        for _ in 0..5 {
            let delete = client
                .delete(format!("{}/extensions/plugin/announcements", base))
                .send();
            let (installed, _) = tokio::join!(
                install(&base, "plugin", announcements_archive()),
                delete
            );
            assert_eq!(installed.status(), StatusCode::OK);

            let on_disk = client
                .get(format!("{}/extensions/plugin/announcements", base))
                .send()
                .await
                .unwrap()
                .status()
                == StatusCode::OK;
            let runtime: Vec<Value> = client
                .get(format!("{}/plugins/runtime", base))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            let served = client
                .get(format!("{}/plugins/announcements/api/latest", base))
                .send()
                .await
                .unwrap()
                .status()
                == StatusCode::OK;

            assert_eq!(on_disk, !runtime.is_empty());
            assert_eq!(on_disk, served);
        }
    }

    #[tokio::test]
    async fn test_uninstall_detaches_plugin_routes() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;
        install(&base, "plugin", announcements_archive()).await;

        let response = reqwest::Client::new()
            .delete(format!("{}/extensions/plugin/announcements", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = reqwest::get(format!("{}/plugins/announcements/api/latest", base))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!temp.path().join("extensions/plugins/announcements").exists());
    }

    #[tokio::test]
    async fn test_admin_token_guards_admin_routes_only() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.server.admin_token = Some("s3cret".to_string());
        let base = spawn(Host::new(config).unwrap()).await;
        let client = reqwest::Client::new();

        let denied = client
            .get(format!("{}/extensions/plugin", base))
            .send()
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = client
            .get(format!("{}/extensions/plugin", base))
            .header(gate::ADMIN_TOKEN_HEADER, "s3cret")
            .send()
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);

        // Unrouted paths reach the plugin fallback, not the gate
        let unrouted = client.get(format!("{}/storefront", base)).send().await.unwrap();
        assert_eq!(unrouted.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_multipart_upload_with_source() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;

        let boundary = "emporium-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n\
                 --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"aurora.zip\"\r\n\
                 Content-Type: application/zip\r\n\r\n",
                b = boundary
            )
            .as_bytes(),
        );
        body.extend_from_slice(&theme_archive("aurora"));
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let response = reqwest::Client::new()
            .post(format!("{}/extensions/theme-admin/install?source=official-market", base))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result: Value = response.json().await.unwrap();
        assert_eq!(result["kind"], "theme-admin");
        assert_eq!(result["source"], "official-market");
    }

    #[tokio::test]
    async fn test_load_and_unload_endpoints() {
        let temp = TempDir::new().unwrap();
        let base = spawn(Host::new(test_config(&temp)).unwrap()).await;
        let client = reqwest::Client::new();

        let missing = client
            .post(format!("{}/plugins/ghost/load", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        install(&base, "plugin", announcements_archive()).await;
        let unloaded: Value = client
            .post(format!("{}/plugins/announcements/unload", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(unloaded["status"], "loaded");

        let again = client
            .post(format!("{}/plugins/announcements/unload", base))
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);

        let loaded: Value = client
            .post(format!("{}/plugins/announcements/load", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(loaded["routePrefix"], "/plugins/announcements/api");
    }

    #[tokio::test]
    async fn test_prepare_clears_scratch_and_loads_installed_plugins() {
        let temp = TempDir::new().unwrap();
        let host = Host::new(test_config(&temp)).unwrap();
        host.installer
            .install(ExtensionKind::Plugin, &announcements_archive()[..], ExtensionSource::LocalZip)
            .await
            .unwrap();
        let stale = host.installer.layout().scratch_root().join("stale-upload");
        std::fs::create_dir_all(&stale).unwrap();

        prepare(&host).await.unwrap();

        assert!(!stale.exists());
        let status = host.loader.status("announcements").await.unwrap();
        assert!(status.is_loaded());
    }
}
