//! Chart packages
//!
//! A chart is loaded fully into memory from either a `.tgz` archive or a
//! directory. Paths inside a chart are `/`-separated and relative to its
//! root (`Chart.yaml`, `templates/deployment.yaml`, `crds/foo.yaml`).

use semver::Version;
use serde::{Deserialize, Serialize};
use simple_ops_core::Values;
use simple_ops_core::archive::{is_archive, read_archive};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{EngineError, Result};

const CHART_FILE: &str = "Chart.yaml";
const VALUES_FILE: &str = "values.yaml";
const README_FILE: &str = "README.md";
const TEMPLATES_PREFIX: &str = "templates/";
const CRDS_PREFIX: &str = "crds/";
const SUBCHARTS_PREFIX: &str = "charts/";

/// `Chart.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,

    #[serde(with = "version_serde")]
    pub version: Version,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ChartDependency>,
}

/// A declared subchart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDependency {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub repository: String,
}

/// A loaded chart
#[derive(Debug, Clone)]
pub struct Chart {
    pub metadata: ChartMetadata,

    /// Chart defaults from `values.yaml`
    pub values: Values,

    files: BTreeMap<String, Vec<u8>>,
}

impl Chart {
    /// Load from an archive or a directory
    pub fn load(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        if !path.exists() {
            return Err(EngineError::Chart {
                chart: label,
                message: "not found".to_string(),
            });
        }

        let files = if is_archive(path) {
            read_archive(path)?
        } else {
            read_dir(path)?
        };
        Self::from_files(&label, files)
    }

    /// Build a chart from its files
    pub fn from_files(label: &str, files: BTreeMap<String, Vec<u8>>) -> Result<Self> {
        let chart_yaml = files.get(CHART_FILE).ok_or_else(|| EngineError::Chart {
            chart: label.to_string(),
            message: format!("missing {}", CHART_FILE),
        })?;
        let metadata: ChartMetadata = serde_yaml::from_slice(chart_yaml).map_err(|e| EngineError::Chart {
            chart: label.to_string(),
            message: format!("invalid {}: {}", CHART_FILE, e),
        })?;

        let values = match files.get(VALUES_FILE) {
            Some(data) => {
                Values::from_yaml(&String::from_utf8_lossy(data)).map_err(|e| EngineError::Chart {
                    chart: label.to_string(),
                    message: format!("invalid {}: {}", VALUES_FILE, e),
                })?
            }
            None => Values::new(),
        };

        let chart = Self {
            metadata,
            values,
            files,
        };
        chart.check_dependencies()?;
        Ok(chart)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &Version {
        &self.metadata.version
    }

    /// Files under `templates/`, keyed by path relative to it
    pub fn templates(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files_under(TEMPLATES_PREFIX)
    }

    /// Files under `crds/`, keyed by full chart path
    pub fn crds(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files
            .iter()
            .filter(|(path, _)| path.starts_with(CRDS_PREFIX))
            .map(|(path, data)| (path.as_str(), data.as_slice()))
    }

    fn files_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a [u8])> {
        self.files
            .iter()
            .filter_map(move |(path, data)| path.strip_prefix(prefix).map(|rel| (rel, data.as_slice())))
    }

    /// `Chart.yaml` as written in the chart
    pub fn chart_yaml(&self) -> String {
        self.text(CHART_FILE)
    }

    /// `values.yaml` as written in the chart; empty when absent
    pub fn values_yaml(&self) -> String {
        self.text(VALUES_FILE)
    }

    /// Top-level README, matched case-insensitively
    pub fn readme(&self) -> String {
        self.files
            .iter()
            .find(|(path, _)| path.eq_ignore_ascii_case(README_FILE))
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
            .unwrap_or_default()
    }

    /// Every CRD file, `---` between files
    pub fn crds_yaml(&self) -> String {
        self.crds()
            .map(|(_, data)| {
                let text = String::from_utf8_lossy(data);
                if text.ends_with('\n') {
                    text.into_owned()
                } else {
                    format!("{}\n", text)
                }
            })
            .collect::<Vec<_>>()
            .join("---\n")
    }

    fn text(&self, path: &str) -> String {
        self.files
            .get(path)
            .map(|data| String::from_utf8_lossy(data).into_owned())
            .unwrap_or_default()
    }

    /// Subcharts present under `charts/`, as directories or archives
    pub fn installed_dependencies(&self) -> BTreeSet<&str> {
        self.files_under(SUBCHARTS_PREFIX)
            .filter_map(|(rel, _)| match rel.split_once('/') {
                Some((dir, _)) => Some(dir),
                None if is_archive(Path::new(rel)) => Some(rel),
                None => None,
            })
            .collect()
    }

    fn check_dependencies(&self) -> Result<()> {
        let declared = self.metadata.dependencies.len();
        let installed = self.installed_dependencies().len();
        if declared != installed {
            return Err(EngineError::ChartDependencies {
                chart: self.metadata.name.clone(),
                declared,
                installed,
            });
        }
        Ok(())
    }
}

fn read_dir(root: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| EngineError::Chart {
            chart: root.display().to_string(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(rel, std::fs::read(entry.path())?);
    }
    Ok(files)
}

/// Serde helper for semver::Version
mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}
