//! Emporium - extension host for the storefront
//!
//! Installs theme and plugin archives, serves the administrative HTTP
//! surface, and mounts loaded plugins under their route prefixes.

mod cli;
mod commands;
mod host;
mod output;
mod server;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args, cli.config.as_deref()).await,
        Commands::Extension(args) => commands::extension::run(args, cli.config.as_deref()).await,
        Commands::Plugin(args) => commands::plugin::run(args, cli.config.as_deref()).await,
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref()),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(filter) = EnvFilter::try_from_default_env() {
        filter
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
