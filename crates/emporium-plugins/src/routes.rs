//! Live route table for loaded plugins
//!
//! Maps route prefixes to targets and is consulted by the server's fallback
//! handler on every request. Registration and removal can happen while
//! requests are in flight: dispatch clones the target out of the table
//! before awaiting it, so an unload never cuts off a request already routed.

use crate::http::{PluginRequest, PluginResponse};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Something that can answer requests under a prefix
#[async_trait]
pub trait RouteTarget: Send + Sync {
    async fn handle(&self, request: PluginRequest) -> PluginResponse;
}

#[derive(Clone)]
struct MountedRoute {
    slug: String,
    target: Arc<dyn RouteTarget>,
}

/// A resolved request: owning slug, prefix and path remainder
pub struct Resolved {
    pub slug: String,
    pub prefix: String,
    pub remainder: String,
    target: Arc<dyn RouteTarget>,
}

#[derive(Clone)]
pub struct RouteTable {
    routes: Arc<RwLock<BTreeMap<String, MountedRoute>>>,
    body_limit: usize,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            routes: Arc::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Mount `target` under `prefix`, replacing whatever was mounted there
    pub async fn register(&self, slug: &str, prefix: &str, target: Arc<dyn RouteTarget>) {
        let prefix = normalize_prefix(prefix);
        let mut routes = self.routes.write().await;
        if let Some(previous) = routes.insert(
            prefix.clone(),
            MountedRoute {
                slug: slug.to_string(),
                target,
            },
        ) {
            debug!("Replaced route {} previously owned by '{}'", prefix, previous.slug);
        }
        info!("Mounted plugin '{}' at {}", slug, prefix);
    }

    /// Swap every route owned by `slug` for `target` under `prefix`
    ///
    /// Requests never observe the slug unmounted in between.
    pub async fn replace_slug(&self, slug: &str, prefix: &str, target: Arc<dyn RouteTarget>) {
        let prefix = normalize_prefix(prefix);
        let mut routes = self.routes.write().await;
        let removed = unmount(&mut routes, slug);
        routes.insert(
            prefix.clone(),
            MountedRoute {
                slug: slug.to_string(),
                target,
            },
        );
        info!(
            "Mounted plugin '{}' at {} (replaced {} route(s))",
            slug, prefix, removed
        );
    }

    /// Remove every route owned by `slug`; returns how many were removed
    pub async fn remove_slug(&self, slug: &str) -> usize {
        let removed = unmount(&mut *self.routes.write().await, slug);
        if removed > 0 {
            info!("Unmounted {} route(s) of plugin '{}'", removed, slug);
        }
        removed
    }

    /// Prefixes owned by `slug`
    pub async fn prefixes_of(&self, slug: &str) -> Vec<String> {
        self.routes
            .read()
            .await
            .iter()
            .filter(|(_, route)| route.slug == slug)
            .map(|(prefix, _)| prefix.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }

    /// Longest mounted prefix that `path` falls under
    pub async fn resolve(&self, path: &str) -> Option<Resolved> {
        let routes = self.routes.read().await;
        routes
            .iter()
            .filter_map(|(prefix, route)| {
                remainder_under(prefix, path).map(|remainder| (prefix, route, remainder))
            })
            .max_by_key(|(prefix, _, _)| prefix.len())
            .map(|(prefix, route, remainder)| Resolved {
                slug: route.slug.clone(),
                prefix: prefix.clone(),
                remainder,
                target: route.target.clone(),
            })
    }

    /// Route a request to its plugin; `None` when no prefix matches
    pub async fn dispatch(&self, request: Request) -> Option<Response> {
        let resolved = self.resolve(request.uri().path()).await?;
        let (parts, body) = request.into_parts();

        let body = match axum::body::to_bytes(body, self.body_limit).await {
            Ok(body) => body,
            Err(e) => {
                return Some(
                    PluginResponse::error(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        format!("request body rejected: {}", e),
                    )
                    .into_response(),
                )
            }
        };

        debug!(
            "Dispatching {} {} to plugin '{}' ({})",
            parts.method, resolved.remainder, resolved.slug, resolved.prefix
        );
        let request = PluginRequest {
            method: parts.method,
            path: resolved.remainder,
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        };
        Some(resolved.target.handle(request).await.into_response())
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

fn unmount(routes: &mut BTreeMap<String, MountedRoute>, slug: &str) -> usize {
    let before = routes.len();
    routes.retain(|_, route| route.slug != slug);
    before - routes.len()
}

fn normalize_prefix(prefix: &str) -> String {
    format!("/{}", prefix.trim_matches('/'))
}

/// Path remainder if `path` is `prefix` itself or below it on a segment boundary
fn remainder_under(prefix: &str, path: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}
