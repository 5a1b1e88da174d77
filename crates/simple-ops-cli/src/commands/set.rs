//! Set command - edit a value in a component config file

use console::style;
use serde_json::Value as JsonValue;
use simple_ops_core::{ConfigStore, Workspace};
use std::io::Read;

use crate::error::{CliError, Result};

pub fn run(workspace: &Workspace, path: &str, value: Option<&str>, stdin: bool) -> Result<()> {
    let value = match (value, stdin) {
        (Some(v), false) => JsonValue::String(v.to_string()),
        (None, true) => read_stdin()?,
        _ => return Err(CliError::usage("set needs either a value or --stdin")),
    };

    ConfigStore::new(workspace.clone()).set(path, value)?;

    println!("{} Set {}", style("✓").green().bold(), path);
    Ok(())
}

/// A YAML value read from stdin; empty input is null
fn read_stdin() -> Result<JsonValue> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    if input.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_yaml::from_str(&input).map_err(|e| CliError::usage(format!("stdin is not valid YAML: {}", e)))
}
