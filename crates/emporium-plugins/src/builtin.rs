//! Internal plugins shipped with the host

use crate::catalog::InternalPlugin;
use crate::error::{LoaderError, Result};
use crate::http::{PluginResponse, PluginRouter};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Storefront announcement banner
///
/// `GET /` returns the configured messages, `GET /latest` the last one.
pub struct Announcements;

#[derive(Debug, Default, Deserialize)]
struct AnnouncementsConfig {
    #[serde(default)]
    messages: Vec<String>,
}

impl InternalPlugin for Announcements {
    fn slug(&self) -> &str {
        "announcements"
    }

    fn register(&self, router: &mut PluginRouter, config: &Value) -> Result<()> {
        let config: AnnouncementsConfig = match config {
            Value::Null => AnnouncementsConfig::default(),
            other => serde_json::from_value(other.clone())
                .map_err(|e| LoaderError::registration_failed(self.slug(), e.to_string()))?,
        };
        let messages = Arc::new(config.messages);

        let all = messages.clone();
        router.get("/", move |_| {
            let all = all.clone();
            async move { PluginResponse::json(StatusCode::OK, &json!({ "messages": all.as_slice() })) }
        });

        let latest = messages;
        router.get("/latest", move |_| {
            let latest = latest.clone();
            async move {
                match latest.last() {
                    Some(message) => {
                        PluginResponse::json(StatusCode::OK, &json!({ "message": message }))
                    }
                    None => PluginResponse::error(StatusCode::NOT_FOUND, "no announcements"),
                }
            }
        });

        Ok(())
    }
}
