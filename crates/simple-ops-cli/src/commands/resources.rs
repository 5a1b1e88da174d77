//! Container-resources command - show requests and limits per container

use serde::Serialize;
use simple_ops_core::{ConfigStore, Workspace, parse_deploy_id};
use simple_ops_engine::ContainerResources;
use simple_ops_engine::inspect::{container_resources, generated_documents};

use super::print_as;
use crate::OutputFormat;
use crate::error::Result;

#[derive(Serialize)]
struct DeployResources {
    name: String,
    resources: Vec<ContainerResources>,
}

pub fn run(workspace: &Workspace, id: Option<&str>, output: OutputFormat) -> Result<()> {
    let store = ConfigStore::new(workspace.clone());

    if let Some(id) = id {
        let (environment, component) = parse_deploy_id(id)?;
        let deploy = store.get_deploy(&component, &environment)?;
        let docs = generated_documents(workspace, &deploy)?;
        return print_as(&container_resources(&docs)?, output);
    }

    let mut result = Vec::new();
    for deploy in store.deploys()?.iter().filter(|d| !d.disabled) {
        let docs = generated_documents(workspace, deploy)?;
        result.push(DeployResources {
            name: deploy.id(),
            resources: container_resources(&docs)?,
        });
    }
    print_as(&result, output)
}
