//! Plugin runtime commands

use anyhow::Result;
use camino::Utf8Path;
use emporium_plugins::{BulkMode, LoadStatus, LoadedPluginInfo};
use tabled::{settings::Style, Table, Tabled};

use crate::cli::{PluginCommands, PluginStatusArgs};
use crate::host::{load_config, Host};
use crate::output;

pub async fn run(cmd: PluginCommands, config: Option<&Utf8Path>) -> Result<()> {
    let host = Host::new(load_config(config)?)?;

    match cmd {
        PluginCommands::Status(args) => status(&host, args).await,
    }
}

#[derive(Tabled)]
struct PluginRow {
    slug: String,
    version: String,
    runtime: String,
    status: String,
    route: String,
    error: String,
}

impl From<&LoadedPluginInfo> for PluginRow {
    fn from(info: &LoadedPluginInfo) -> Self {
        Self {
            slug: info.slug.clone(),
            version: info.version.clone(),
            runtime: info
                .runtime_type
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status: info.status.to_string(),
            route: info.route_prefix.clone().unwrap_or_else(|| "-".to_string()),
            error: info.error.clone().unwrap_or_default(),
        }
    }
}

async fn status(host: &Host, args: PluginStatusArgs) -> Result<()> {
    let mode = if args.strict {
        BulkMode::Strict
    } else {
        BulkMode::SkipOnError
    };
    let loaded = host.load_plugins(mode).await?;

    if args.json {
        return output::json(&loaded);
    }

    if loaded.is_empty() {
        output::info("No plugins installed");
        return Ok(());
    }

    let rows: Vec<PluginRow> = loaded.iter().map(PluginRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);

    let failed = loaded
        .iter()
        .filter(|info| info.status == LoadStatus::Failed)
        .count();
    if failed > 0 {
        output::warning(&format!("{} plugin(s) failed to load", failed));
    }
    Ok(())
}
