//! CLI commands

use serde::Serialize;

use crate::OutputFormat;
use crate::error::{CliError, Result};

pub mod add;
pub mod deploy;
pub mod generate;
pub mod images;
pub mod init;
pub mod resources;
pub mod set;
pub mod show;
pub mod verify;

/// Print a value as YAML or as pretty JSON
pub(crate) fn print_as<T: Serialize>(value: &T, output: OutputFormat) -> Result<()> {
    let rendered = match output {
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| CliError::config(e.to_string()))?,
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(value).map_err(|e| CliError::config(e.to_string()))?;
            json.push('\n');
            json
        }
    };
    print!("{}", rendered);
    Ok(())
}
