//! Chart provenance ledger (`simple-ops.lock`)
//!
//! Key features:
//! - One entry per pulled chart archive
//! - Idempotent registration of identical (name, repository, version)
//! - SHA-256 verification of `charts/<name>-<version>.tgz` against the ledger

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::digest;
use crate::error::{CoreError, Result};

/// Lock file format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    #[serde(default)]
    pub charts: Vec<ChartSource>,
}

/// A pulled chart and its archive digest
///
/// Fields are declared in the order they are written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSource {
    #[serde(rename = "chart", alias = "name", alias = "charts")]
    pub name: String,

    #[serde(default)]
    pub digest: String,

    #[serde(default)]
    pub repository: String,

    #[serde(default)]
    pub version: String,
}

impl ChartSource {
    /// Archive file name under `charts/`
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.name, self.version)
    }
}

impl LockFile {
    /// Parse lock file content; empty content is an empty ledger
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str::<Option<Self>>(content)?.unwrap_or_default())
    }

    /// Get an entry by chart name
    pub fn get(&self, name: &str) -> Option<&ChartSource> {
        self.charts.iter().find(|c| c.name == name)
    }
}

/// Result of checking the chart cache against the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartReport {
    /// Archives whose digest equals the recorded one
    pub matched: Vec<String>,
    /// Archives present with a different digest
    pub mismatched: Vec<DigestMismatch>,
    /// Ledger entries without an archive on disk
    pub missing: Vec<String>,
    /// Archives on disk not named by the ledger
    pub untracked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMismatch {
    pub archive: String,
    pub expected: String,
    pub actual: String,
}

impl ChartReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty() && self.untracked.is_empty()
    }
}

/// Reads and writes the lock file at a fixed path
#[derive(Debug, Clone)]
pub struct LockStore {
    path: PathBuf,
}

impl LockStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger
    ///
    /// The file must exist; it is created by `init`, never implicitly.
    pub fn lock_file(&self) -> Result<LockFile> {
        if !self.path.exists() {
            return Err(CoreError::LockFileNotFound {
                path: self.path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(&self.path)?;
        LockFile::parse(&content).map_err(|e| CoreError::config(self.path.display().to_string(), e))
    }

    /// Save the ledger
    pub fn save(&self, lock: &LockFile) -> Result<()> {
        std::fs::write(&self.path, serde_yaml::to_string(lock)?)?;
        Ok(())
    }

    /// Register a chart
    ///
    /// Returns `false` when an entry with the same name, repository and
    /// version already exists; the file is left untouched in that case.
    pub fn add_chart(&self, name: &str, repository: &str, version: &str, digest: &str) -> Result<bool> {
        let mut lock = self.lock_file()?;
        let exists = lock
            .charts
            .iter()
            .any(|c| c.name == name && c.repository == repository && c.version == version);
        if exists {
            tracing::debug!(chart = name, version, "chart already locked");
            return Ok(false);
        }

        lock.charts.push(ChartSource {
            name: name.to_string(),
            digest: digest.to_string(),
            repository: repository.to_string(),
            version: version.to_string(),
        });
        self.save(&lock)?;
        tracing::debug!(chart = name, version, "chart added to lock file");
        Ok(true)
    }

    /// Compare every ledger entry with its archive under `charts_dir`
    pub fn verify_charts(&self, charts_dir: &Path) -> Result<ChartReport> {
        let lock = self.lock_file()?;
        let mut report = ChartReport::default();
        let mut tracked = BTreeSet::new();

        for chart in &lock.charts {
            let archive = chart.archive_name();
            let path = charts_dir.join(&archive);
            tracked.insert(archive.clone());

            if !path.is_file() {
                report.missing.push(archive);
                continue;
            }
            let actual = digest::sha256_file(&path)?;
            if actual == chart.digest {
                report.matched.push(archive);
            } else {
                report.mismatched.push(DigestMismatch {
                    archive,
                    expected: chart.digest.clone(),
                    actual,
                });
            }
        }

        if charts_dir.is_dir() {
            let mut untracked: Vec<String> = std::fs::read_dir(charts_dir)?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|name| name.ends_with(".tgz") && !tracked.contains(name))
                .collect();
            untracked.sort();
            report.untracked = untracked;
        }

        Ok(report)
    }
}
