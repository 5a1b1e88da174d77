//! Add command - register a chart archive in the lock file

use console::style;
use serde_json::Value as JsonValue;
use simple_ops_core::digest::sha256_file;
use simple_ops_core::{ConfigStore, Workspace};

use crate::error::{CliError, Result};

pub fn run(workspace: &Workspace, name: &str, repo: &str, version: &str, add_config: bool) -> Result<()> {
    let archive_name = format!("{}-{}.tgz", name, version);
    let archive = workspace.charts_dir().join(&archive_name);
    if !archive.is_file() {
        return Err(CliError::config_with_help(
            format!("chart archive {} not found", archive.display()),
            format!("download {} {} from {} into charts/ first", name, version, repo),
        ));
    }

    let digest = sha256_file(&archive)?;
    let added = workspace.lock_store().add_chart(name, repo, version, &digest)?;
    if added {
        println!(
            "{} Added {} {} to {}",
            style("✓").green().bold(),
            name,
            version,
            workspace.lock_path().display()
        );
    } else {
        println!("{} {} {} is already locked", style("✓").green().bold(), name, version);
    }

    if add_config {
        let config = workspace.component_config(name);
        if config.exists() {
            ConfigStore::new(workspace.clone()).set(&format!("{}.chart", name), JsonValue::String(archive_name))?;
        } else {
            std::fs::create_dir_all(workspace.config_dir())?;
            std::fs::write(&config, format!("chart: {}\n", archive_name))?;
        }
        println!("  {} {}", style("→").blue(), config.display());
    }
    Ok(())
}
