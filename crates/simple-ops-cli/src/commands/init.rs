//! Init command - create the workspace layout

use console::style;
use simple_ops_core::{ConfigStore, Workspace};

use crate::error::Result;

const GLOBAL_TEMPLATE: &str = r#"# Defaults merged under every component in config/.
# Component files win over these, and deploy.<environment> wins over both.
#
# namespace:
#   create: true
#   inject: true
# labels:
#   managed-by: simple-ops
"#;

pub fn run(workspace: &Workspace, force: bool) -> Result<()> {
    ConfigStore::new(workspace.clone()).init(force, GLOBAL_TEMPLATE)?;

    println!(
        "{} Initialized simple-ops workspace in {}",
        style("✓").green().bold(),
        workspace.root().display()
    );
    println!();
    println!("Next steps:");
    println!("  1. Add a component: config/<name>.yml with a deploy: section");
    println!("  2. Place chart archives in charts/ and register them with `simple-ops add`");
    println!("  3. Run `simple-ops generate`");

    Ok(())
}
