//! Plugin loader integration tests
//!
//! Tests the load state machine against installed plugins:
//! - Internal plugins with and without their entry module
//! - Catalog lookups for internal plugins
//! - Disabled plugins, unload, and bulk loading in both modes
//! - Failed reloads that keep the previous attachment serving
//! - Loads and unloads under a guard the installer already holds

mod common;

use axum::http::{Method, StatusCode};
use common::*;
use emporium_core::{ExtensionKind, ExtensionSource};
use emporium_plugins::{BulkMode, LoadOptions, LoadStatus, LoaderError};
use serde_json::json;
use std::time::Duration;

#[cfg(test)]
mod loader {
    use super::*;

    #[tokio::test]
    async fn test_internal_plugin_with_entry_module_loads() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, true)).await;

        let options = LoadOptions {
            config: json!({"stars": 5}),
            ..LoadOptions::default()
        };
        let info = env.loader.load(REVIEWS_SLUG, &options).await.unwrap();
        assert_eq!(info.status, LoadStatus::Loaded);
        assert_eq!(info.version, "2.0.0");
        assert!(info.error.is_none());

        let response = env
            .request(Method::GET, "/plugins/reviews/api", "")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["config"]["stars"], 5);
    }

    #[tokio::test]
    async fn test_missing_entry_module_fails_and_is_recorded() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, false)).await;

        let err = env
            .loader
            .load(REVIEWS_SLUG, &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::EntryModuleNotFound { .. }));

        let status = env.loader.status(REVIEWS_SLUG).await.unwrap();
        assert_eq!(status.status, LoadStatus::Failed);
        assert!(status.error.unwrap().contains(REVIEWS_ENTRY));
        assert!(env.loader.routes().is_empty().await);

        // Still installed even though it cannot run
        assert!(env
            .installer
            .get(ExtensionKind::Plugin, REVIEWS_SLUG)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_internal_plugin_without_catalog_entry_is_invalid_export() {
        let env = PluginEnv::new();
        env.install(internal_archive("wishlist", true)).await;

        let err = env
            .loader
            .load("wishlist", &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::InvalidPluginExport { .. }));
        assert_eq!(
            env.loader.status("wishlist").await.unwrap().status,
            LoadStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_not_installed() {
        let env = PluginEnv::new();
        let err = env
            .loader
            .load("ghost", &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::PluginNotInstalled { .. }));
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_disabled_plugin_attaches_nothing() {
        let env = PluginEnv::new();
        env.install(external_archive(DEMO_PAY_SLUG, UNREACHABLE_BASE_URL)).await;

        let options = LoadOptions {
            disabled: true,
            ..LoadOptions::default()
        };
        let info = env.loader.load(DEMO_PAY_SLUG, &options).await.unwrap();
        assert_eq!(info.status, LoadStatus::Disabled);
        assert!(env
            .request(Method::GET, "/plugins/demo-pay/api/x", "")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_custom_route_prefix() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, true)).await;

        let options = LoadOptions {
            route_prefix: Some("/shop/reviews".into()),
            ..LoadOptions::default()
        };
        env.loader.load(REVIEWS_SLUG, &options).await.unwrap();

        assert!(env.request(Method::GET, "/shop/reviews", "").await.is_some());
        assert!(env
            .request(Method::GET, "/plugins/reviews/api", "")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unload_removes_routes_and_status() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, true)).await;
        env.loader.load(REVIEWS_SLUG, &LoadOptions::default()).await.unwrap();

        let removed = env.loader.unload(REVIEWS_SLUG).await;
        assert_eq!(removed.map(|i| i.status), Some(LoadStatus::Loaded));
        assert!(env.loader.status(REVIEWS_SLUG).await.is_none());
        assert!(env
            .request(Method::GET, "/plugins/reviews/api", "")
            .await
            .is_none());

        assert!(env.loader.unload(REVIEWS_SLUG).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_attachment_serving() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, true)).await;
        env.loader.load(REVIEWS_SLUG, &LoadOptions::default()).await.unwrap();

        let manifest = env.installer.layout().plugin_dir(REVIEWS_SLUG).join("manifest.json");
        std::fs::write(&manifest, "{ not json").unwrap();

        let err = env
            .loader
            .load(REVIEWS_SLUG, &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::InvalidManifest { .. }));

        let response = env
            .request(Method::GET, "/plugins/reviews/api", "")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = env.loader.status(REVIEWS_SLUG).await.unwrap();
        assert_eq!(status.status, LoadStatus::Loaded);
        assert!(status.error.unwrap().contains("Invalid manifest"));

        // A good reload clears the error
        env.install(internal_archive(REVIEWS_SLUG, true)).await;
        let info = env.loader.load(REVIEWS_SLUG, &LoadOptions::default()).await.unwrap();
        assert!(info.error.is_none());
    }

    #[tokio::test]
    async fn test_reload_after_removal_from_disk_unmounts() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, true)).await;
        env.loader.load(REVIEWS_SLUG, &LoadOptions::default()).await.unwrap();

        std::fs::remove_dir_all(env.installer.layout().plugin_dir(REVIEWS_SLUG)).unwrap();
        let err = env
            .loader
            .load(REVIEWS_SLUG, &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::PluginNotInstalled { .. }));
        assert!(env.loader.routes().is_empty().await);
        assert_eq!(
            env.loader.status(REVIEWS_SLUG).await.unwrap().status,
            LoadStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_load_under_install_guard_runs_before_waiting_load() {
        let env = PluginEnv::new();
        let archive = external_archive(DEMO_PAY_SLUG, UNREACHABLE_BASE_URL);
        let (_, guard) = env
            .installer
            .install_guarded(ExtensionKind::Plugin, &archive[..], ExtensionSource::LocalZip)
            .await
            .unwrap();

        let loader = env.loader.clone();
        let disable = tokio::spawn(async move {
            let options = LoadOptions {
                disabled: true,
                ..LoadOptions::default()
            };
            loader.load(DEMO_PAY_SLUG, &options).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!disable.is_finished());

        let info = tokio::time::timeout(
            Duration::from_secs(1),
            env.loader.load_guarded(&guard, &LoadOptions::default()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(info.status, LoadStatus::Loaded);

        drop(guard);
        let info = disable.await.unwrap().unwrap();
        assert_eq!(info.status, LoadStatus::Disabled);
        assert!(env.loader.routes().is_empty().await);
    }

    #[tokio::test]
    async fn test_unload_guarded_then_uninstall_under_one_guard() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, true)).await;
        env.loader.load(REVIEWS_SLUG, &LoadOptions::default()).await.unwrap();

        let guard = env.installer.lock(ExtensionKind::Plugin, REVIEWS_SLUG).await;
        let removed = env.loader.unload_guarded(&guard).await;
        assert_eq!(removed.map(|i| i.status), Some(LoadStatus::Loaded));
        env.installer.uninstall_guarded(&guard).await.unwrap();
        drop(guard);

        assert!(env.loader.routes().is_empty().await);
        assert!(matches!(
            env.loader.load(REVIEWS_SLUG, &LoadOptions::default()).await,
            Err(LoaderError::PluginNotInstalled { .. })
        ));
    }

    #[tokio::test]
    async fn test_theme_guard_loads_nothing() {
        let env = PluginEnv::new();
        let guard = env.installer.lock(ExtensionKind::ThemeShop, REVIEWS_SLUG).await;
        assert!(matches!(
            env.loader.load_guarded(&guard, &LoadOptions::default()).await,
            Err(LoaderError::PluginNotInstalled { .. })
        ));
        assert!(env.loader.unload_guarded(&guard).await.is_none());
        assert!(env.loader.status(REVIEWS_SLUG).await.is_none());
    }

    #[tokio::test]
    async fn test_bulk_load_skip_on_error_isolates_failures() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, true)).await;
        env.install(internal_archive("broken", false)).await;
        env.install(external_archive(DEMO_PAY_SLUG, UNREACHABLE_BASE_URL)).await;

        let results = env
            .loader
            .load_all(BulkMode::SkipOnError, |_| LoadOptions::default())
            .await
            .unwrap();

        let summary: Vec<_> = results.iter().map(|i| (i.slug.as_str(), i.status)).collect();
        assert_eq!(
            summary,
            vec![
                ("broken", LoadStatus::Failed),
                (DEMO_PAY_SLUG, LoadStatus::Loaded),
                (REVIEWS_SLUG, LoadStatus::Loaded),
            ]
        );
        assert_eq!(env.loader.statuses().await.len(), 3);
    }

    #[tokio::test]
    async fn test_bulk_load_strict_aborts_on_first_failure() {
        let env = PluginEnv::new();
        env.install(internal_archive("broken", false)).await;
        env.install(internal_archive(REVIEWS_SLUG, true)).await;

        let err = env
            .loader
            .load_all(BulkMode::Strict, |_| LoadOptions::default())
            .await
            .unwrap_err();

        match err {
            LoaderError::BatchAborted { slug, source } => {
                assert_eq!(slug, "broken");
                assert!(matches!(*source, LoaderError::EntryModuleNotFound { .. }));
            }
            other => panic!("expected BatchAborted, got {:?}", other),
        }
        // "reviews" sorts after "broken" and was never attempted
        assert!(env.loader.status(REVIEWS_SLUG).await.is_none());
    }

    #[tokio::test]
    async fn test_bulk_load_honours_per_slug_options() {
        let env = PluginEnv::new();
        env.install(internal_archive(REVIEWS_SLUG, true)).await;
        env.install(external_archive(DEMO_PAY_SLUG, UNREACHABLE_BASE_URL)).await;

        let results = env
            .loader
            .load_all(BulkMode::Strict, |slug| LoadOptions {
                disabled: slug == DEMO_PAY_SLUG,
                ..LoadOptions::default()
            })
            .await
            .unwrap();

        let demo = results.iter().find(|i| i.slug == DEMO_PAY_SLUG).unwrap();
        assert_eq!(demo.status, LoadStatus::Disabled);
        assert_eq!(env.loader.routes().len().await, 1);
    }
}
