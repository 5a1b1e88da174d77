//! Verify command - check deploy/ against a fresh generation

use console::style;
use simple_ops_core::{ConfigStore, Workspace};
use simple_ops_engine::Generator;

use crate::error::{CliError, Result};

pub fn run(workspace: &Workspace, charts: bool) -> Result<()> {
    let deploys = ConfigStore::new(workspace.clone()).deploys()?;
    let generator = Generator::new(workspace.clone());

    let mut consistent = true;

    let report = generator.verify_report(&deploys)?;
    if report.is_consistent() {
        println!("{} deploy/ is up to date", style("✓").green().bold());
    } else {
        consistent = false;
        println!("{} deploy/ differs from generated output", style("✗").red().bold());

        for path in &report.added {
            println!("  {} {}", style("+").green(), path);
        }
        for path in &report.removed {
            println!("  {} {}", style("-").red(), path);
        }
        for path in &report.changed {
            println!("  {} {}", style("~").yellow(), path);
        }
    }

    if charts {
        let report = workspace.lock_store().verify_charts(&workspace.charts_dir())?;
        for archive in &report.matched {
            println!("  {} {}", style("✓").green(), archive);
        }
        for mismatch in &report.mismatched {
            println!(
                "  {} {}: expected {}, got {}",
                style("✗").red(),
                mismatch.archive,
                mismatch.expected,
                mismatch.actual
            );
        }
        for archive in &report.missing {
            println!("  {} {}: missing from charts/", style("✗").red(), archive);
        }
        for archive in &report.untracked {
            println!("  {} {}: not in lock file", style("⚠").yellow(), archive);
        }
        if report.is_consistent() {
            println!("{} charts match the lock file", style("✓").green().bold());
        } else {
            consistent = false;
        }
    }

    if consistent {
        Ok(())
    } else {
        Err(CliError::drift("Verification failed"))
    }
}
