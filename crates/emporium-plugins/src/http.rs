//! Request/response types seen by plugin routes
//!
//! Internal plugins register plain async handlers on a [`PluginRouter`]. The
//! router is mounted under the plugin's prefix, so handlers only ever see
//! the path remainder (`/orders` for `/plugins/{slug}/api/orders`).

use crate::routes::RouteTarget;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A request addressed to a plugin, already stripped of its route prefix
#[derive(Debug, Clone)]
pub struct PluginRequest {
    pub method: Method,
    /// Path remainder, always starting with `/`
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PluginRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct PluginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PluginResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                let mut response = Self::new(status, body);
                response.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
            Err(e) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    /// `{"error": message}` with the given status
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(status, &serde_json::json!({ "error": message.into() }))
    }
}

impl IntoResponse for PluginResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

type Handler = Arc<dyn Fn(PluginRequest) -> BoxFuture<'static, PluginResponse> + Send + Sync>;

/// Exact-path router an internal plugin fills in at registration
#[derive(Clone, Default)]
pub struct PluginRouter {
    routes: HashMap<String, HashMap<Method, Handler>>,
}

impl PluginRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F, Fut>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResponse> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |req| Box::pin(handler(req)));
        self.routes
            .entry(normalize(path))
            .or_default()
            .insert(method, handler);
        self
    }

    pub fn get<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResponse> + Send + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(PluginRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PluginResponse> + Send + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.routes.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl std::fmt::Debug for PluginRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRouter")
            .field("paths", &self.paths())
            .finish()
    }
}

#[async_trait]
impl RouteTarget for PluginRouter {
    async fn handle(&self, request: PluginRequest) -> PluginResponse {
        let Some(methods) = self.routes.get(&normalize(&request.path)) else {
            return PluginResponse::error(StatusCode::NOT_FOUND, "no such plugin route");
        };
        match methods.get(&request.method) {
            Some(handler) => handler(request).await,
            None => PluginResponse::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        }
    }
}

/// Leading slash, no trailing slash except for the root
fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}
