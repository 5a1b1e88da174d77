//! Chain execution for one deployment

use serde_json::json;
use simple_ops_core::config::CRDS_FILE;
use simple_ops_core::{Deployment, Namespace, Workspace};
use std::fs;
use std::path::Path;

use crate::actions::{ChainContext, action_fn};
use crate::error::{EngineError, Result};
use crate::jsonnet::{JsonnetCli, JsonnetEvaluator};
use crate::kustomize::{KustomizeCli, OverlayApplier};
use crate::render::{ChartRenderer, TemplateRenderer};

/// External collaborators used by the actions
pub struct Tools {
    pub renderer: Box<dyn ChartRenderer>,
    pub overlays: Box<dyn OverlayApplier>,
    pub jsonnet: Box<dyn JsonnetEvaluator>,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            renderer: Box::new(TemplateRenderer::new()),
            overlays: Box::new(KustomizeCli::default()),
            jsonnet: Box::new(JsonnetCli::default()),
        }
    }
}

impl Tools {
    pub fn with_renderer(mut self, renderer: impl ChartRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_overlays(mut self, overlays: impl OverlayApplier + 'static) -> Self {
        self.overlays = Box::new(overlays);
        self
    }

    pub fn with_jsonnet(mut self, jsonnet: impl JsonnetEvaluator + 'static) -> Self {
        self.jsonnet = Box::new(jsonnet);
        self
    }
}

/// Runs deployment chains against one staging root
pub struct ChainExecutor<'a> {
    workspace: &'a Workspace,
    staging: &'a Path,
    tools: &'a Tools,
}

impl<'a> ChainExecutor<'a> {
    pub fn new(workspace: &'a Workspace, staging: &'a Path, tools: &'a Tools) -> Self {
        Self {
            workspace,
            staging,
            tools,
        }
    }

    /// Render one deployment into the staging root
    ///
    /// Writes `deploy/<environment>/<component>/manifest.yaml`, always, and
    /// `crds.yaml` next to it when the chart bundles CRDs. The first failing
    /// action aborts the chain.
    pub fn run_chain(&self, deploy: &Deployment) -> Result<()> {
        let id = deploy.id();
        let span = tracing::debug_span!("deploy", id = %id);
        let _enter = span.enter();

        let mut ctx = ChainContext::new(deploy, self.workspace, self.staging, self.tools);
        let manifest = ctx.manifest_path();
        if let Some(dir) = manifest.parent() {
            fs::create_dir_all(dir)?;
        }

        if deploy.namespace.create && !deploy.namespace.name.is_empty() {
            ctx.manifest = namespace_document(&deploy.namespace)?;
        }

        for action in &deploy.chain {
            tracing::debug!(action = %action, "running action");
            action_fn(*action)(&mut ctx).map_err(|e| EngineError::Chain {
                deploy: id.clone(),
                action: action.to_string(),
                source: Box::new(e),
            })?;
        }

        ctx.flush()?;
        if !manifest.exists() {
            fs::write(&manifest, "")?;
        }
        if !ctx.crds.is_empty() {
            let crds = manifest.with_file_name(CRDS_FILE);
            fs::write(crds, &ctx.crds)?;
        }

        tracing::debug!("chain complete");
        Ok(())
    }
}

/// Minimal Namespace manifest; `name` is always among its labels
fn namespace_document(ns: &Namespace) -> Result<String> {
    let mut labels = ns.labels.clone();
    labels.insert("name".to_string(), ns.name.clone());

    let doc = json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "labels": labels,
            "name": ns.name,
        },
    });
    Ok(serde_yaml::to_string(&doc)?)
}
