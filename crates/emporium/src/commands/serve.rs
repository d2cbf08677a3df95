//! Serve command

use anyhow::{Context, Result};
use camino::Utf8Path;
use tokio::net::TcpListener;
use tracing::info;

use crate::cli::ServeArgs;
use crate::host::{load_config, Host};
use crate::server;

pub async fn run(args: ServeArgs, config: Option<&Utf8Path>) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if args.no_load {
        config.loader.load_on_start = false;
    }

    let host = Host::new(config)?;
    server::prepare(&host).await?;

    let listener = TcpListener::bind(&host.config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", host.config.server.bind))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, server::router(host))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
