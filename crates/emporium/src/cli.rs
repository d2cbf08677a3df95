//! CLI argument definitions

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use emporium_core::{ExtensionKind, ExtensionSource};

#[derive(Parser, Debug)]
#[command(name = "emporium")]
#[command(author, version, about = "Extension host for the Emporium storefront")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ./emporium.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the administrative server and plugin routes
    Serve(ServeArgs),

    /// Install, remove and inspect extensions
    #[command(subcommand)]
    Extension(ExtensionCommands),

    /// Plugin runtime commands
    #[command(subcommand)]
    Plugin(PluginCommands),

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

// Serve command

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides server.bind)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Do not load installed plugins at startup
    #[arg(long)]
    pub no_load: bool,
}

// Extension commands

#[derive(Subcommand, Debug)]
pub enum ExtensionCommands {
    /// Install an extension from a zip archive
    Install(ExtensionInstallArgs),

    /// Remove an installed extension
    Uninstall(ExtensionUninstallArgs),

    /// List installed extensions
    List(ExtensionListArgs),

    /// Show one installed extension
    Info(ExtensionInfoArgs),
}

#[derive(Args, Debug)]
pub struct ExtensionInstallArgs {
    /// Extension kind: theme-shop, theme-admin or plugin
    pub kind: ExtensionKind,

    /// Path to the zip archive
    pub archive: Utf8PathBuf,

    /// Where the archive came from
    #[arg(long, default_value = "local-zip")]
    pub source: ExtensionSource,
}

#[derive(Args, Debug)]
pub struct ExtensionUninstallArgs {
    /// Extension kind: theme-shop, theme-admin or plugin
    pub kind: ExtensionKind,

    /// Extension slug
    pub slug: String,
}

#[derive(Args, Debug)]
pub struct ExtensionListArgs {
    /// Only list this kind
    pub kind: Option<ExtensionKind>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExtensionInfoArgs {
    /// Extension kind: theme-shop, theme-admin or plugin
    pub kind: ExtensionKind,

    /// Extension slug
    pub slug: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Plugin commands

#[derive(Subcommand, Debug)]
pub enum PluginCommands {
    /// Load every installed plugin and report the outcome
    Status(PluginStatusArgs),
}

#[derive(Args, Debug)]
pub struct PluginStatusArgs {
    /// Stop at the first plugin that fails to load
    #[arg(long)]
    pub strict: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Config commands

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}
