//! `acisync kinds`

use std::fmt::Write;

use acisync_core::EntityKind;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let names = EntityKind::vocabulary();
    let rendered = match global.output {
        OutputFormat::Table => names.iter().enumerate().fold(String::new(), |mut out, (i, name)| {
            let _ = writeln!(out, "{:>2}. {name}", i + 1);
            out
        }),
        OutputFormat::Json => serde_json::to_string_pretty(&names)?,
        OutputFormat::Yaml => serde_yaml::to_string(&names)?,
    };
    output::print_output(rendered.trim_end(), global.quiet);
    Ok(())
}
