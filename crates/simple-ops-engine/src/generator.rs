//! Generation and verification of the `deploy/` tree

use simple_ops_core::digest::{file_digests, sha256_dir};
use simple_ops_core::{Deployment, Workspace};
use std::io;

use crate::error::Result;
use crate::executor::{ChainExecutor, Tools};
use crate::staging::Staging;

/// File-level differences between a fresh generation and the live tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Files generation would create
    pub added: Vec<String>,
    /// Live files generation would no longer produce
    pub removed: Vec<String>,
    /// Files whose content would change
    pub changed: Vec<String>,
}

impl DriftReport {
    pub fn is_consistent(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Renders deployments and owns promotion of the live `deploy/` tree
pub struct Generator {
    workspace: Workspace,
    tools: Tools,
}

impl Generator {
    pub fn new(workspace: Workspace) -> Self {
        Self::with_tools(workspace, Tools::default())
    }

    pub fn with_tools(workspace: Workspace, tools: Tools) -> Self {
        Self { workspace, tools }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Render every enabled deployment into a fresh staging root
    fn stage(&self, deploys: &[Deployment]) -> Result<Staging> {
        let staging = Staging::new()?;
        let executor = ChainExecutor::new(&self.workspace, staging.path(), &self.tools);

        for deploy in deploys {
            if deploy.disabled {
                tracing::debug!(deploy = %deploy.id(), "skipping disabled deployment");
                continue;
            }
            executor.run_chain(deploy)?;
        }
        Ok(staging)
    }

    /// Regenerate and replace the live `deploy/` tree
    ///
    /// Nothing is promoted unless every deployment succeeds.
    pub fn generate(&self, deploys: &[Deployment]) -> Result<()> {
        let staging = self.stage(deploys)?;
        staging.promote(self.workspace.root())?;
        tracing::info!(deployments = deploys.len(), "generated manifests");
        Ok(())
    }

    /// Whether a fresh generation matches the live `deploy/` tree
    ///
    /// Compares one digest over each tree. The live tree is never touched.
    pub fn verify(&self, deploys: &[Deployment]) -> Result<bool> {
        let staging = self.stage(deploys)?;
        let live = self.live_deploy_dir()?;

        let staged = sha256_dir(&staging.deploy_dir())?;
        let current = sha256_dir(&live)?;
        tracing::debug!(staged = %staged, live = %current, "compared deploy digests");
        Ok(staged == current)
    }

    /// Per-file comparison of a fresh generation against the live tree
    pub fn verify_report(&self, deploys: &[Deployment]) -> Result<DriftReport> {
        let staging = self.stage(deploys)?;
        let live = self.live_deploy_dir()?;

        let staged = file_digests(&staging.deploy_dir())?;
        let current = file_digests(&live)?;

        let mut report = DriftReport::default();
        for (path, digest) in &staged {
            match current.get(path) {
                None => report.added.push(path.clone()),
                Some(live_digest) if live_digest != digest => report.changed.push(path.clone()),
                Some(_) => {}
            }
        }
        report.removed = current
            .keys()
            .filter(|path| !staged.contains_key(*path))
            .cloned()
            .collect();
        Ok(report)
    }

    fn live_deploy_dir(&self) -> Result<std::path::PathBuf> {
        let live = self.workspace.deploy_dir();
        if !live.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist, run generate first", live.display()),
            )
            .into());
        }
        Ok(live)
    }
}
