//! Images command - list container images in generated manifests

use serde::Serialize;
use simple_ops_core::{ConfigStore, Workspace, parse_deploy_id};
use simple_ops_engine::inspect::{generated_documents, images, unique};

use super::print_as;
use crate::OutputFormat;
use crate::error::Result;

/// Images of one generated manifest
#[derive(Serialize)]
struct FileImages {
    file: String,
    images: Vec<String>,
}

pub fn run(workspace: &Workspace, id: Option<&str>, per_file: bool, output: OutputFormat) -> Result<()> {
    let store = ConfigStore::new(workspace.clone());

    if let Some(id) = id {
        let (environment, component) = parse_deploy_id(id)?;
        let deploy = store.get_deploy(&component, &environment)?;
        let docs = generated_documents(workspace, &deploy)?;
        return print_as(&unique(images(&docs)), output);
    }

    let mut files = Vec::new();
    for deploy in store.deploys()?.iter().filter(|d| !d.disabled) {
        let docs = generated_documents(workspace, deploy)?;
        let path = workspace.manifest_path(deploy);
        let file = path
            .strip_prefix(workspace.root())
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        files.push(FileImages {
            file,
            images: images(&docs),
        });
    }

    if per_file {
        let files: Vec<_> = files
            .into_iter()
            .map(|f| FileImages {
                file: f.file,
                images: unique(f.images),
            })
            .collect();
        print_as(&files, output)
    } else {
        print_as(&unique(files.into_iter().flat_map(|f| f.images)), output)
    }
}
