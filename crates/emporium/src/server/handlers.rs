//! Route handlers for the administrative surface and plugin dispatch

use super::error::ApiError;
use super::AppState;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use emporium_core::{ExtensionKind, ExtensionSource};
use emporium_extensions::{InstallResult, InstalledExtension};
use emporium_plugins::LoadedPluginInfo;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Multipart field carrying the archive; the first file field is used otherwise
const ARCHIVE_FIELD: &str = "file";

/// Last segment of the install route, also a valid slug
const INSTALL_SEGMENT: &str = "install";

#[derive(Debug, Deserialize)]
pub struct InstallQuery {
    source: Option<String>,
}

fn parse_kind(kind: &str) -> Result<ExtensionKind, ApiError> {
    kind.parse()
        .map_err(|e: emporium_core::Error| ApiError::bad_request(e.to_string()))
}

/// POST /extensions/{kind}/install
pub async fn install_extension(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<InstallQuery>,
    request: Request,
) -> Result<Json<InstallResult>, ApiError> {
    let kind = parse_kind(&kind)?;
    let source = match query.source.as_deref() {
        Some(source) => source
            .parse::<ExtensionSource>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => ExtensionSource::LocalZip,
    };

    let archive = read_archive(&state, request).await?;
    info!("Installing {} archive ({} bytes)", kind, archive.len());

    let (result, guard) = state
        .host
        .installer
        .install_guarded(kind, &archive[..], source)
        .await
        .map_err(ApiError::install)?;

    if kind == ExtensionKind::Plugin {
        // Load failures are recorded in the runtime status, not returned here
        let options = state.host.load_options(&result.slug);
        if let Err(e) = state.host.loader.load_guarded(&guard, &options).await {
            warn!("Installed plugin '{}' did not load: {}", result.slug, e);
        }
    }

    Ok(Json(result))
}

/// Raw body, or the archive part of a multipart form
async fn read_archive(state: &AppState, request: Request) -> Result<Bytes, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        return Bytes::from_request(request, state)
            .await
            .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;

    let mut fallback = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        let named = field.name() == Some(ARCHIVE_FIELD);
        let is_file = field.file_name().is_some();
        if !named && (!is_file || fallback.is_some()) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        if named {
            return Ok(bytes);
        }
        fallback = Some(bytes);
    }

    fallback.ok_or_else(|| ApiError::bad_request("multipart upload has no archive field"))
}

/// DELETE /extensions/{kind}/{slug}
pub async fn uninstall_extension(
    State(state): State<AppState>,
    Path((kind, slug)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    remove(&state, &kind, &slug).await
}

/// DELETE /extensions/{kind}/install
///
/// The install route is static and would otherwise hide a slug named `install`.
pub async fn uninstall_install_slug(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Value>, ApiError> {
    remove(&state, &kind, INSTALL_SEGMENT).await
}

async fn remove(state: &AppState, kind: &str, slug: &str) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(kind)?;

    let guard = state.host.installer.lock(kind, slug).await;
    if kind == ExtensionKind::Plugin {
        state.host.loader.unload_guarded(&guard).await;
    }
    state
        .host
        .installer
        .uninstall_guarded(&guard)
        .await
        .map_err(ApiError::uninstall)?;

    Ok(Json(json!({ "success": true })))
}

/// GET /extensions/{kind}
pub async fn list_extensions(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<InstalledExtension>>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.host.installer.list(kind).await?))
}

/// GET /extensions/{kind}/{slug}
pub async fn get_extension(
    State(state): State<AppState>,
    Path((kind, slug)): Path<(String, String)>,
) -> Result<Json<InstalledExtension>, ApiError> {
    lookup(&state, &kind, &slug).await
}

/// GET /extensions/{kind}/install
pub async fn get_install_slug(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<InstalledExtension>, ApiError> {
    lookup(&state, &kind, INSTALL_SEGMENT).await
}

async fn lookup(state: &AppState, kind: &str, slug: &str) -> Result<Json<InstalledExtension>, ApiError> {
    let kind = parse_kind(kind)?;
    state
        .host
        .installer
        .get(kind, slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{} '{}' is not installed", kind, slug)))
}

/// GET /plugins/runtime
pub async fn runtime_status(State(state): State<AppState>) -> Json<Vec<LoadedPluginInfo>> {
    Json(state.host.loader.statuses().await)
}

/// POST /plugins/{slug}/load
pub async fn load_plugin(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<LoadedPluginInfo>, ApiError> {
    let options = state.host.load_options(&slug);
    Ok(Json(state.host.loader.load(&slug, &options).await?))
}

/// POST /plugins/{slug}/unload
pub async fn unload_plugin(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<LoadedPluginInfo>, ApiError> {
    state
        .host
        .loader
        .unload(&slug)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("plugin '{}' is not loaded", slug)))
}

/// Everything else goes to the plugin that owns the path, if any
pub async fn dispatch_plugin(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    match state.host.loader.routes().dispatch(request).await {
        Some(response) => response,
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no route for {}", path) })),
        )
            .into_response(),
    }
}
