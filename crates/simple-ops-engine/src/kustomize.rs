//! Kustomize overlays
//!
//! Overlays are applied by building a directory that holds a
//! `kustomization.yaml`. The `kustomize` binary does the patching.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{EngineError, Result};

pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Builds a kustomization directory into a manifest stream
pub trait OverlayApplier {
    fn apply(&self, dir: &Path) -> Result<Vec<u8>>;
}

/// Runs `kustomize build <dir>`
#[derive(Debug, Clone)]
pub struct KustomizeCli {
    binary: PathBuf,
}

impl Default for KustomizeCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("kustomize"),
        }
    }
}

impl KustomizeCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl OverlayApplier for KustomizeCli {
    fn apply(&self, dir: &Path) -> Result<Vec<u8>> {
        let output = Command::new(&self.binary)
            .arg("build")
            .arg(dir)
            .output()
            .map_err(|e| EngineError::Kustomize {
                message: format!("could not run {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(EngineError::Kustomize {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}
