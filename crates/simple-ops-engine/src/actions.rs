//! Chain actions
//!
//! Each [`Action`] maps to one function over a [`ChainContext`]. Actions
//! edit the in-memory manifest buffer; `kustomize` and `jsonnet` work on
//! the staged manifest file and flush the buffer first.

use serde_json::Value as JsonValue;
use simple_ops_core::config::{CONFIG_SUFFIX, DEPLOY_DIR, MANIFEST_FILE};
use simple_ops_core::{Action, Deployment, Values, Workspace};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::chart::Chart;
use crate::documents;
use crate::error::{EngineError, Result};
use crate::executor::Tools;
use crate::jsonnet;
use crate::kustomize::KUSTOMIZATION_FILE;
use crate::render::ReleaseInfo;
use crate::staging::{copy_tree, resolve_within};

const SEPARATOR: &str = "---\n";

/// One step of a chain
pub type ActionFn = fn(&mut ChainContext<'_>) -> Result<()>;

/// Look up the function implementing an action
pub fn action_fn(action: Action) -> ActionFn {
    match action {
        Action::Helm => helm,
        Action::With => with,
        Action::Namespace => namespace,
        Action::Labels => labels,
        Action::Kustomize => kustomize,
        Action::Jsonnet => jsonnet,
    }
}

/// State threaded through the actions of one deployment
pub struct ChainContext<'a> {
    pub deploy: &'a Deployment,
    pub workspace: &'a Workspace,
    pub staging: &'a Path,
    pub tools: &'a Tools,
    /// Pending manifest documents
    pub manifest: String,
    /// CRD documents, written to `crds.yaml` at the end
    pub crds: String,
}

impl<'a> ChainContext<'a> {
    pub fn new(deploy: &'a Deployment, workspace: &'a Workspace, staging: &'a Path, tools: &'a Tools) -> Self {
        Self {
            deploy,
            workspace,
            staging,
            tools,
            manifest: String::new(),
            crds: String::new(),
        }
    }

    /// Staged manifest file of the deployment
    pub fn manifest_path(&self) -> PathBuf {
        Workspace::manifest_path_in(self.staging, self.deploy)
    }

    /// Append a chunk to the manifest buffer
    pub fn append(&mut self, chunk: &str) {
        push_terminated(&mut self.manifest, chunk);
    }

    /// Append one CRD file to the CRD buffer
    pub fn append_crd(&mut self, content: &str) {
        if !self.crds.is_empty() && !content.starts_with("---") {
            self.crds.push_str(SEPARATOR);
        }
        push_terminated(&mut self.crds, content);
    }

    /// Move the manifest buffer to the end of the staged manifest file
    pub fn flush(&mut self) -> Result<()> {
        if self.manifest.is_empty() {
            return Ok(());
        }
        let path = self.manifest_path();
        let mut content = read_or_empty(&path)?;
        let pending = std::mem::take(&mut self.manifest);

        if content.is_empty() {
            content.push_str(pending.strip_prefix(SEPARATOR).unwrap_or(&pending));
        } else {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            if !pending.starts_with("---") {
                content.push_str(SEPARATOR);
            }
            content.push_str(&pending);
        }

        fs::write(&path, content)?;
        Ok(())
    }
}

fn push_terminated(buf: &mut String, chunk: &str) {
    if chunk.is_empty() {
        return;
    }
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(chunk);
    if !chunk.ends_with('\n') {
        buf.push('\n');
    }
}

fn read_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Render the deployment's chart into the buffer
fn helm(ctx: &mut ChainContext<'_>) -> Result<()> {
    let deploy = ctx.deploy;
    if deploy.chart.is_empty() {
        return Ok(());
    }

    let chart = Chart::load(&ctx.workspace.chart_path(deploy))?;
    let release = ReleaseInfo::new(chart.name(), &deploy.namespace.name);
    let rendered = ctx.tools.renderer.render(&chart, &deploy.values, &release)?;

    ctx.append(&rendered.manifest);
    for (path, content) in &rendered.crds {
        tracing::debug!(crd = %path, "collected CRD");
        ctx.append_crd(content);
    }
    Ok(())
}

/// Instantiate `with/<group>.yml` templates
fn with(ctx: &mut ChainContext<'_>) -> Result<()> {
    let deploy = ctx.deploy;

    for (group, instances) in &deploy.with_templates {
        let file_name = format!("{}{}", group, CONFIG_SUFFIX);
        let file = ctx.workspace.with_dir().join(&file_name);
        if !file.is_file() {
            return Err(EngineError::WithTemplate {
                group: group.clone(),
                message: format!("template file {} not found", file.display()),
            });
        }
        let template = Values::from_file(&file).map_err(|e| EngineError::WithTemplate {
            group: group.clone(),
            message: e.to_string(),
        })?;

        for (name, instance) in instances {
            let mut doc = template.merged(&instance.values);
            doc.set("metadata.name", JsonValue::String(name.clone()))
                .map_err(|e| EngineError::WithTemplate {
                    group: group.clone(),
                    message: e.to_string(),
                })?;
            let yaml = doc.to_yaml()?;

            if instance.path.is_empty() {
                ctx.append(&format!("---\n# Source: simple-ops with {}\n{}", file_name, yaml));
            } else {
                let target = resolve_within(ctx.staging, &instance.path)?;
                if target.exists() {
                    return Err(EngineError::DuplicatePath {
                        path: instance.path.clone(),
                    });
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, yaml)?;
            }
            tracing::debug!(group = %group, instance = %name, "generated with template");
        }
    }
    Ok(())
}

/// Point every namespaced document at the deployment namespace
fn namespace(ctx: &mut ChainContext<'_>) -> Result<()> {
    let deploy = ctx.deploy;
    let ns = &deploy.namespace;
    if ns.name.is_empty() {
        return Ok(());
    }
    ctx.manifest = documents::rewrite(&ctx.manifest, |doc| doc.set_namespace(&ns.name, ns.inject))?;
    Ok(())
}

/// Merge the resource labels into every document
fn labels(ctx: &mut ChainContext<'_>) -> Result<()> {
    let deploy = ctx.deploy;
    let labels = &deploy.resource_labels;
    if labels.is_empty() {
        return Ok(());
    }
    ctx.manifest = documents::rewrite(&ctx.manifest, |doc| doc.add_labels(labels))?;
    Ok(())
}

/// Patch the staged manifest with each configured overlay
fn kustomize(ctx: &mut ChainContext<'_>) -> Result<()> {
    let deploy = ctx.deploy;
    if deploy.kustomizations.is_empty() {
        return Ok(());
    }
    ctx.flush()?;

    for rel in deploy.preserve_paths.iter().chain(&deploy.kustomization_paths) {
        let src = resolve_within(ctx.workspace.root(), rel)?;
        let dst = resolve_within(ctx.staging, rel)?;
        copy_tree(&src, &dst, false)?;
    }

    let manifest = ctx.manifest_path();
    if !manifest.exists() {
        fs::write(&manifest, "")?;
    }
    let resource = format!(
        "{}/{}/{}/{}",
        DEPLOY_DIR, deploy.environment, deploy.component, MANIFEST_FILE
    );
    let kustomization = ctx.staging.join(KUSTOMIZATION_FILE);

    for (i, overlay) in deploy.kustomizations.iter().enumerate() {
        let mut spec = Values::new().merged(overlay);
        spec.set("resources", JsonValue::Array(vec![JsonValue::String(resource.clone())]))?;
        fs::write(&kustomization, spec.to_yaml()?)?;

        let patched = ctx.tools.overlays.apply(ctx.staging);
        fs::remove_file(&kustomization)?;
        fs::write(&manifest, patched?)?;
        tracing::debug!(overlay = i, "applied kustomization");
    }
    Ok(())
}

/// Append Jsonnet program output to the staged manifest
fn jsonnet(ctx: &mut ChainContext<'_>) -> Result<()> {
    let deploy = ctx.deploy;
    if deploy.jsonnet_programs.is_empty() {
        return Ok(());
    }
    ctx.flush()?;

    let path = ctx.manifest_path();
    let mut content = read_or_empty(&path)?;
    for (name, program) in &deploy.jsonnet_programs {
        let yaml = jsonnet::evaluate(ctx.tools.jsonnet.as_ref(), ctx.workspace.root(), name, program)?;
        if !content.is_empty() {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(SEPARATOR);
        }
        content.push_str(&format!("# Source: simple-ops jsonnet {}\n", name));
        content.push_str(&yaml);
        tracing::debug!(program = %name, "evaluated jsonnet program");
    }

    fs::write(&path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir, Deployment, Tools) {
        let root = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let deploy = Deployment::from_values(Values::new(), "app", "dev").unwrap();
        fs::create_dir_all(staging.path().join("deploy/dev/app")).unwrap();
        (root, staging, deploy, Tools::default())
    }

    #[test]
    fn test_flush_separates_appends() {
        let (root, staging, deploy, tools) = setup();
        let workspace = Workspace::new(root.path());
        let mut ctx = ChainContext::new(&deploy, &workspace, staging.path(), &tools);

        ctx.append("---\n# Source: a\na: 1");
        ctx.flush().unwrap();
        ctx.append("b: 2\n");
        ctx.flush().unwrap();

        let content = fs::read_to_string(ctx.manifest_path()).unwrap();
        assert_eq!(content, "# Source: a\na: 1\n---\nb: 2\n");
        assert!(ctx.manifest.is_empty());
    }

    #[test]
    fn test_crd_buffer_separator() {
        let (root, staging, deploy, tools) = setup();
        let workspace = Workspace::new(root.path());
        let mut ctx = ChainContext::new(&deploy, &workspace, staging.path(), &tools);

        ctx.append_crd("kind: A");
        ctx.append_crd("kind: B\n");

        assert_eq!(ctx.crds, "kind: A\n---\nkind: B\n");
    }

    #[test]
    fn test_namespace_and_labels_noop_when_unset() {
        let (root, staging, deploy, tools) = setup();
        let workspace = Workspace::new(root.path());
        let mut ctx = ChainContext::new(&deploy, &workspace, staging.path(), &tools);
        ctx.append("---\nkind: A\n");

        namespace(&mut ctx).unwrap();
        labels(&mut ctx).unwrap();

        assert_eq!(ctx.manifest, "---\nkind: A\n");
    }

    #[test]
    fn test_with_missing_group_file() {
        let (root, staging, mut deploy, tools) = setup();
        deploy
            .with_templates
            .entry("missing".to_string())
            .or_default()
            .insert("x".to_string(), Default::default());
        let workspace = Workspace::new(root.path());
        let mut ctx = ChainContext::new(&deploy, &workspace, staging.path(), &tools);

        let err = with(&mut ctx).unwrap_err();
        assert!(matches!(err, EngineError::WithTemplate { ref group, .. } if group == "missing"));
    }

    #[test]
    fn test_helm_without_chart_is_noop() {
        let (root, staging, deploy, tools) = setup();
        let workspace = Workspace::new(root.path());
        let mut ctx = ChainContext::new(&deploy, &workspace, staging.path(), &tools);

        helm(&mut ctx).unwrap();
        assert!(ctx.manifest.is_empty());
    }
}
