//! Config subcommand handlers.

use std::io::Write;

use uncli_config::config_path;

use super::load_settings;
use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    match args.command {
        ConfigCommand::Show => {
            let settings = load_settings(global)?;
            write!(out, "{}", settings.to_redacted_toml()?)?;
        }
        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(config_path);
            writeln!(out, "{}", path.display())?;
        }
    }
    Ok(())
}
