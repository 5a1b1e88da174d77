//! Deploy command - print one resolved deployment

use simple_ops_core::{ConfigStore, Workspace, parse_deploy_id};

use super::print_as;
use crate::OutputFormat;
use crate::error::Result;

pub fn run(workspace: &Workspace, id: &str, output: OutputFormat) -> Result<()> {
    let (environment, component) = parse_deploy_id(id)?;
    let deploy = ConfigStore::new(workspace.clone()).get_deploy(&component, &environment)?;
    print_as(&deploy, output)
}
