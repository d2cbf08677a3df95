//! Extension commands

use anyhow::{anyhow, Context, Result};
use camino::Utf8Path;
use emporium_core::ExtensionKind;
use emporium_extensions::{ExtensionInstaller, InstalledExtension, SlugLocks};
use tabled::{settings::Style, Table, Tabled};

use crate::cli::{
    ExtensionCommands, ExtensionInfoArgs, ExtensionInstallArgs, ExtensionListArgs,
    ExtensionUninstallArgs,
};
use crate::host::load_config;
use crate::output;

pub async fn run(cmd: ExtensionCommands, config: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config)?;
    let installer = ExtensionInstaller::new(config.extensions_root, SlugLocks::new());

    match cmd {
        ExtensionCommands::Install(args) => install(&installer, args).await,
        ExtensionCommands::Uninstall(args) => uninstall(&installer, args).await,
        ExtensionCommands::List(args) => list(&installer, args).await,
        ExtensionCommands::Info(args) => info(&installer, args).await,
    }
}

async fn install(installer: &ExtensionInstaller, args: ExtensionInstallArgs) -> Result<()> {
    let archive = tokio::fs::File::open(&args.archive)
        .await
        .with_context(|| format!("Failed to open {}", args.archive))?;

    let result = installer
        .install(args.kind, archive, args.source)
        .await
        .with_context(|| format!("Failed to install {} from {}", args.kind, args.archive))?;

    output::success(&format!(
        "Installed {} '{}' v{}",
        result.kind, result.slug, result.version
    ));
    output::kv("Path", &result.fs_path.display().to_string());
    output::kv("Source", result.source.as_str());
    Ok(())
}

async fn uninstall(installer: &ExtensionInstaller, args: ExtensionUninstallArgs) -> Result<()> {
    installer
        .uninstall(args.kind, &args.slug)
        .await
        .with_context(|| format!("Failed to uninstall {} '{}'", args.kind, args.slug))?;
    output::success(&format!("Removed {} '{}'", args.kind, args.slug));
    Ok(())
}

#[derive(Tabled)]
struct ExtensionRow {
    kind: String,
    slug: String,
    name: String,
    version: String,
    source: String,
    #[tabled(rename = "installed at")]
    installed_at: String,
}

impl ExtensionRow {
    fn new(kind: ExtensionKind, extension: &InstalledExtension) -> Self {
        Self {
            kind: kind.to_string(),
            slug: extension.slug().to_string(),
            name: extension.name().to_string(),
            version: extension.version().to_string(),
            source: extension.source().to_string(),
            installed_at: extension.installed_at().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

async fn list(installer: &ExtensionInstaller, args: ExtensionListArgs) -> Result<()> {
    let kinds = match args.kind {
        Some(kind) => vec![kind],
        None => ExtensionKind::ALL.to_vec(),
    };

    let mut listed = Vec::new();
    for kind in kinds {
        let extensions = installer
            .list(kind)
            .await
            .with_context(|| format!("Failed to list {} extensions", kind))?;
        listed.extend(extensions.into_iter().map(|e| (kind, e)));
    }

    if args.json {
        let extensions: Vec<_> = listed.iter().map(|(_, e)| e).collect();
        return output::json(&extensions);
    }

    if listed.is_empty() {
        output::info("No extensions installed");
        return Ok(());
    }

    let rows: Vec<ExtensionRow> = listed
        .iter()
        .map(|(kind, extension)| ExtensionRow::new(*kind, extension))
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
    Ok(())
}

async fn info(installer: &ExtensionInstaller, args: ExtensionInfoArgs) -> Result<()> {
    let extension = installer
        .get(args.kind, &args.slug)
        .await?
        .ok_or_else(|| anyhow!("{} '{}' is not installed", args.kind, args.slug))?;

    if args.json {
        return output::json(&extension);
    }

    output::header(&format!("{} ({})", extension.name(), args.kind));
    output::kv("Slug", extension.slug());
    output::kv("Version", extension.version());
    output::kv("Source", extension.source().as_str());
    output::kv("Path", &extension.fs_path().display().to_string());
    output::kv("Installed", &extension.installed_at().to_rfc3339());

    match &extension {
        InstalledExtension::Theme(theme) => {
            output::kv("Category", &theme.category);
            if let Some(author) = &theme.author {
                output::kv("Author", author);
            }
        }
        InstalledExtension::Plugin(plugin) => {
            output::kv("Runtime", &plugin.runtime_type.to_string());
            if let Some(entry) = &plugin.entry_module {
                output::kv("Entry module", entry);
            }
            if let Some(base) = &plugin.external_base_url {
                output::kv("Base URL", base);
            }
        }
    }
    Ok(())
}
