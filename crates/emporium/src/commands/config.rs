//! Config command

use anyhow::Result;
use camino::Utf8Path;

use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::host::load_config;
use crate::output;

const REDACTED: &str = "********";

pub fn run(cmd: ConfigCommands, config: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, config),
    }
}

fn show(args: ConfigShowArgs, config: Option<&Utf8Path>) -> Result<()> {
    let mut effective = load_config(config)?;
    if effective.server.admin_token.is_some() {
        effective.server.admin_token = Some(REDACTED.to_string());
    }

    if args.json {
        return output::json(&effective);
    }

    print!("{}", serde_yaml_ng::to_string(&effective)?);
    Ok(())
}
