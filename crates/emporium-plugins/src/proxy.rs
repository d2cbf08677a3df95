//! Reverse proxy for external-http plugins
//!
//! Forwards method, headers, query and body to `{externalBaseUrl}{remainder}`
//! and relays the upstream status, headers and body unchanged. Every request
//! is bounded by the configured timeout; failures become 502/504 responses
//! and never touch loader state.

use crate::error::ProxyError;
use crate::http::{PluginRequest, PluginResponse};
use crate::routes::RouteTarget;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use emporium_core::config::ProxyConfig;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Connection-scoped headers that must not cross the proxy
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Clone)]
pub struct ReverseProxy {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReverseProxy {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::Client(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward one request to `base` and return the upstream's response
    pub async fn forward(&self, base: &Url, request: PluginRequest) -> Result<PluginResponse, ProxyError> {
        let url = upstream_url(base, &request.path, request.query.as_deref());
        debug!("Proxying {} {}", request.method, url);

        let upstream = self
            .client
            .request(request.method, url.clone())
            .headers(forwardable(request.headers))
            .body(request.body)
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        let status = upstream.status();
        let headers = forwardable(upstream.headers().clone());
        let body = upstream.bytes().await.map_err(|e| self.classify(&url, e))?;

        Ok(PluginResponse {
            status,
            headers,
            body,
        })
    }

    fn classify(&self, url: &Url, e: reqwest::Error) -> ProxyError {
        let url = url.to_string();
        if e.is_timeout() {
            ProxyError::Timeout {
                url,
                secs: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            ProxyError::Connect {
                url,
                message: e.to_string(),
            }
        } else {
            ProxyError::Upstream {
                url,
                message: e.to_string(),
            }
        }
    }
}

/// Mounted proxy for one plugin
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    proxy: ReverseProxy,
    base: Url,
}

impl ProxyRoute {
    pub fn new(proxy: ReverseProxy, base: Url) -> Self {
        Self { proxy, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

#[async_trait]
impl RouteTarget for ProxyRoute {
    async fn handle(&self, request: PluginRequest) -> PluginResponse {
        match self.proxy.forward(&self.base, request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{}", e);
                PluginResponse::error(e.status(), e.to_string())
            }
        }
    }
}

/// `{base}{remainder}` with the base's own path kept as a prefix
fn upstream_url(base: &Url, remainder: &str, query: Option<&str>) -> Url {
    let mut url = base.clone();
    let path = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        remainder.trim_start_matches('/')
    );
    url.set_path(&path);
    url.set_query(query);
    url
}

/// Drop hop-by-hop headers, `Host` and framing headers reqwest/hyper set themselves
fn forwardable(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers
}
