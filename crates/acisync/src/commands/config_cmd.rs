//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::commands::effective_config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(acisync_config::config_path);

    match args.command {
        ConfigCommand::Init { force } => {
            acisync_config::write_default(&path, force)?;
            output::print_output(&format!("Wrote {}", path.display()), global.quiet);
        }
        ConfigCommand::Show => {
            let shown = effective_config(global)?.redacted();
            let rendered = match global.output {
                OutputFormat::Table => shown.to_toml()?,
                OutputFormat::Json => serde_json::to_string_pretty(&shown)?,
                OutputFormat::Yaml => serde_yaml::to_string(&shown)?,
            };
            output::print_output(rendered.trim_end(), global.quiet);
        }
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), false);
        }
    }
    Ok(())
}
