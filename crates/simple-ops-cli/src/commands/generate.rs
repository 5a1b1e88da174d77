//! Generate command - regenerate deploy/

use console::style;
use simple_ops_core::{ConfigStore, Workspace};
use simple_ops_engine::Generator;

use crate::error::Result;

pub fn run(workspace: &Workspace) -> Result<()> {
    let deploys = ConfigStore::new(workspace.clone()).deploys()?;
    let enabled = deploys.iter().filter(|d| !d.disabled).count();

    Generator::new(workspace.clone()).generate(&deploys)?;

    println!(
        "{} Generated {} deployment(s) into {}",
        style("✓").green().bold(),
        enabled,
        workspace.deploy_dir().display()
    );
    let skipped = deploys.len() - enabled;
    if skipped > 0 {
        println!("  {} {} disabled deployment(s) skipped", style("⚠").yellow(), skipped);
    }
    Ok(())
}
