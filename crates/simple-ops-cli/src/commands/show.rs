//! Show command - print part of a deployment's chart

use clap::ValueEnum;
use simple_ops_core::{ConfigStore, Workspace, parse_deploy_id};
use simple_ops_engine::ChartPart;
use simple_ops_engine::inspect::show_chart;

use crate::error::Result;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ShowPart {
    /// Chart.yaml
    Chart,
    /// values.yaml
    Values,
    /// README.md
    Readme,
    /// Files under crds/
    Crds,
    /// Everything above
    All,
}

impl From<ShowPart> for ChartPart {
    fn from(part: ShowPart) -> Self {
        match part {
            ShowPart::Chart => ChartPart::Chart,
            ShowPart::Values => ChartPart::Values,
            ShowPart::Readme => ChartPart::Readme,
            ShowPart::Crds => ChartPart::Crds,
            ShowPart::All => ChartPart::All,
        }
    }
}

pub fn run(workspace: &Workspace, part: ShowPart, id: &str) -> Result<()> {
    let (environment, component) = parse_deploy_id(id)?;
    let deploy = ConfigStore::new(workspace.clone()).get_deploy(&component, &environment)?;
    print!("{}", show_chart(workspace, &deploy, part.into())?);
    Ok(())
}
