//! Workspace layout and the layered configuration store
//!
//! A workspace looks like:
//!
//! ```text
//! simple-ops.yml          global defaults
//! simple-ops.lock         chart ledger
//! config/<component>.yml  one file per component, with a `deploy:` map
//! with/<group>.yml        templates for the `with` action
//! charts/                 pulled chart archives
//! deploy/<env>/<component>/manifest.yaml
//! ```
//!
//! Precedence, lowest to highest: global file, component file, the
//! component's `deploy.<environment>` block.

use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};

use crate::deploy::Deployment;
use crate::error::{CoreError, Result};
use crate::lock::LockStore;
use crate::values::{Values, merge_maps, set_path};

pub const CONFIG_DIR: &str = "config";
pub const DEPLOY_DIR: &str = "deploy";
pub const CHARTS_DIR: &str = "charts";
pub const WITH_DIR: &str = "with";
pub const CONFIG_SUFFIX: &str = ".yml";
pub const GLOBAL_CONFIG_FILE: &str = "simple-ops.yml";
pub const LOCK_FILE: &str = "simple-ops.lock";
pub const MANIFEST_FILE: &str = "manifest.yaml";
pub const CRDS_FILE: &str = "crds.yaml";

/// Key holding per-environment overrides
const DEPLOY_KEY: &str = "deploy";

/// Root of a simple-ops working directory
///
/// Every path used by the tool is derived from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    pub fn deploy_dir(&self) -> PathBuf {
        self.root.join(DEPLOY_DIR)
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.root.join(CHARTS_DIR)
    }

    pub fn with_dir(&self) -> PathBuf {
        self.root.join(WITH_DIR)
    }

    pub fn global_config(&self) -> PathBuf {
        self.root.join(GLOBAL_CONFIG_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn component_config(&self, component: &str) -> PathBuf {
        self.config_dir().join(format!("{}{}", component, CONFIG_SUFFIX))
    }

    pub fn lock_store(&self) -> LockStore {
        LockStore::new(self.lock_path())
    }

    /// `deploy/<environment>/<component>/manifest.yaml` below `base`
    pub fn manifest_path_in(base: &Path, deploy: &Deployment) -> PathBuf {
        base.join(DEPLOY_DIR)
            .join(&deploy.environment)
            .join(&deploy.component)
            .join(MANIFEST_FILE)
    }

    /// Live manifest path of a deployment
    pub fn manifest_path(&self, deploy: &Deployment) -> PathBuf {
        Self::manifest_path_in(&self.root, deploy)
    }

    /// Chart archive or directory of a deployment
    pub fn chart_path(&self, deploy: &Deployment) -> PathBuf {
        self.charts_dir().join(&deploy.chart)
    }
}

/// Discovers, merges and decodes component configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    workspace: Workspace,
}

impl ConfigStore {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// All deployments, components sorted by name, environments sorted within
    ///
    /// Any unreadable or malformed file fails the whole call.
    pub fn deploys(&self) -> Result<Vec<Deployment>> {
        let global = self.read_tree(&self.workspace.global_config())?;
        let mut deploys = Vec::new();

        for (component, path) in self.component_files()? {
            let tree = self.read_tree(&path)?;
            let merged = merge_maps(&global, &tree);
            let built = build_deploys(merged, &component, &path.display().to_string())?;
            tracing::debug!(component = %component, count = built.len(), "loaded component");
            deploys.extend(built);
        }

        Ok(deploys)
    }

    /// One deployment by component and environment
    pub fn get_deploy(&self, component: &str, environment: &str) -> Result<Deployment> {
        self.deploys()?
            .into_iter()
            .find(|d| d.component == component && d.environment == environment)
            .ok_or_else(|| CoreError::DeployNotFound {
                environment: environment.to_string(),
                component: component.to_string(),
            })
    }

    /// Create the workspace skeleton
    ///
    /// Refuses a non-empty root unless `force` is set.
    pub fn init(&self, force: bool, template: &str) -> Result<()> {
        let root = self.workspace.root();
        if root.is_dir() && std::fs::read_dir(root)?.next().is_some() && !force {
            return Err(CoreError::NotEmpty {
                path: root.display().to_string(),
            });
        }

        for dir in [
            self.workspace.config_dir(),
            self.workspace.deploy_dir(),
            self.workspace.charts_dir(),
            self.workspace.with_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(self.workspace.global_config(), template)?;
        std::fs::write(self.workspace.lock_path(), "")?;
        tracing::info!(root = %root.display(), "initialized workspace");
        Ok(())
    }

    /// Set a value in a component file
    ///
    /// The first path segment names the file (`app.deploy.prod.values.x`
    /// edits `config/app.yml`); the rest address a node inside it.
    pub fn set(&self, path: &str, value: JsonValue) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        let (component, rest) = match parts.split_first() {
            Some((c, rest)) if !c.is_empty() => (*c, rest),
            _ => {
                return Err(CoreError::InvalidSetPath {
                    path: path.to_string(),
                    message: "missing config file name".to_string(),
                });
            }
        };

        let file = self.workspace.component_config(component);
        if !file.is_file() {
            return Err(CoreError::NotFound {
                path: file.display().to_string(),
            });
        }
        let mut tree = JsonValue::Object(self.read_tree(&file)?);
        set_path(&mut tree, rest, value).map_err(|message| CoreError::InvalidSetPath {
            path: path.to_string(),
            message,
        })?;
        std::fs::write(&file, serde_yaml::to_string(&tree)?)?;
        tracing::debug!(file = %file.display(), path, "updated config");
        Ok(())
    }

    /// Component name and path of every `config/*.yml`, sorted by name
    fn component_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.workspace.config_dir();
        if !dir.is_dir() {
            return Err(CoreError::NotFound {
                path: dir.display().to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(component) = name.strip_suffix(CONFIG_SUFFIX) {
                files.push((component.to_string(), entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse a YAML file into a map; empty files are empty maps
    fn read_tree(&self, path: &Path) -> Result<Map<String, JsonValue>> {
        if !path.is_file() {
            return Err(CoreError::NotFound {
                path: path.display().to_string(),
            });
        }
        let values = Values::from_file(path).map_err(|e| CoreError::config(path.display().to_string(), e))?;
        match values.into_inner() {
            JsonValue::Object(map) => Ok(map),
            other => Err(CoreError::config(
                path.display().to_string(),
                format!("expected a map at the top level, found {}", type_name(&other)),
            )),
        }
    }
}

/// Expand a component tree into one deployment per `deploy.<environment>`
///
/// The `deploy` key is removed from the component tree first so it does not
/// leak into the environments. Null environments are ignored. `source`
/// names the file in errors.
pub fn build_deploys(
    mut component_tree: Map<String, JsonValue>,
    component: &str,
    source: &str,
) -> Result<Vec<Deployment>> {
    check_id_part("component", component, source)?;
    let environments = match component_tree.remove(DEPLOY_KEY) {
        Some(JsonValue::Object(envs)) => envs,
        Some(JsonValue::Null) | None => Map::new(),
        Some(other) => {
            return Err(CoreError::config(
                source,
                format!("'deploy' must be a map, found {}", type_name(&other)),
            ));
        }
    };

    // serde_json maps iterate in key order
    let mut deploys = Vec::with_capacity(environments.len());
    for (environment, overrides) in environments {
        let overrides = match overrides {
            JsonValue::Object(map) => map,
            JsonValue::Null => continue,
            other => {
                return Err(CoreError::config(
                    source,
                    format!("deploy.{} must be a map, found {}", environment, type_name(&other)),
                ));
            }
        };
        check_id_part("environment", &environment, source)?;
        let merged = Values(JsonValue::Object(merge_maps(&component_tree, &overrides)));
        let deploy = Deployment::from_values(merged, component, &environment)
            .map_err(|e| CoreError::config(source, format!("deploy.{}: {}", environment, e)))?;
        deploys.push(deploy);
    }
    Ok(deploys)
}

/// Deployment ids are `environment.component`, so neither part may hold a dot
fn check_id_part(kind: &str, name: &str, source: &str) -> Result<()> {
    if name.is_empty() || name.contains('.') {
        return Err(CoreError::config(
            source,
            format!("{} name '{}' must be non-empty and must not contain '.'", kind, name),
        ));
    }
    Ok(())
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn workspace(global: &str, components: &[(&str, &str)]) -> (TempDir, ConfigStore) {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());
        std::fs::create_dir_all(ws.config_dir()).unwrap();
        std::fs::write(ws.global_config(), global).unwrap();
        for (name, content) in components {
            std::fs::write(ws.component_config(name), content).unwrap();
        }
        (temp, ConfigStore::new(ws))
    }

    #[test]
    fn test_environment_overrides_component_and_global() {
        let (_temp, store) = workspace(
            "values:\n  more: true\n",
            &[(
                "app",
                "values:\n  more: true\ndeploy:\n  e1:\n    values:\n      more: false\n  e2: {}\n",
            )],
        );

        let deploys = store.deploys().unwrap();

        assert_eq!(deploys.len(), 2);
        assert_eq!(deploys[0].id(), "e1.app");
        assert_eq!(deploys[0].values.get("more").unwrap(), false);
        assert_eq!(deploys[1].id(), "e2.app");
        assert_eq!(deploys[1].values.get("more").unwrap(), true);
    }

    #[test]
    fn test_component_deploys() {
        let component = r#"
chart: b-1.0.0.tgz
namespace:
  name: test
  create: true
  inject: true
values:
  more: true
with:
  serviceEntry:
    github:
      values:
        spec:
          hosts: [github.com]
deploy:
  test:
    with:
      serviceEntry:
        github:
          path: se/github.yaml
    values:
      more: false
    namespace:
      inject: false
  test2:
    with:
      serviceEntry:
        github: ~
"#;
        let (_temp, store) = workspace("labels:\n  managed-by: simple-ops\n", &[("b", component)]);

        let test = store.get_deploy("b", "test").unwrap();
        assert_eq!(test.chart, "b-1.0.0.tgz");
        assert_eq!(test.namespace.name, "test");
        assert!(test.namespace.create);
        assert!(!test.namespace.inject);
        assert_eq!(test.values.get("more").unwrap(), false);
        assert_eq!(test.resource_labels["managed-by"], "simple-ops");
        let github = &test.with_templates["serviceEntry"]["github"];
        assert_eq!(github.path, "se/github.yaml");
        assert_eq!(github.values.get("spec.hosts.0").unwrap(), "github.com");

        // null override keeps the component-level instance
        let test2 = store.get_deploy("b", "test2").unwrap();
        assert!(test2.namespace.inject);
        let github = &test2.with_templates["serviceEntry"]["github"];
        assert_eq!(github.path, "");
        assert_eq!(github.values.get("spec.hosts.0").unwrap(), "github.com");
    }

    #[test]
    fn test_unknown_action_names_file() {
        let (_temp, store) = workspace("", &[("app", "deploy:\n  prod:\n    chain: [helm, nope]\n")]);

        let err = store.deploys().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("app.yml"));
        assert!(message.contains("Unknown action 'nope'"));
    }

    #[test]
    fn test_components_sorted_and_non_yml_ignored() {
        let (temp, store) = workspace(
            "",
            &[("zeta", "deploy:\n  prod: {}\n"), ("alpha", "deploy:\n  prod: {}\n  dev: {}\n")],
        );
        std::fs::write(temp.path().join("config/notes.txt"), "x").unwrap();

        let ids: Vec<_> = store.deploys().unwrap().iter().map(Deployment::id).collect();

        assert_eq!(ids, vec!["dev.alpha", "prod.alpha", "prod.zeta"]);
    }

    #[test]
    fn test_null_environment_skipped() {
        let (_temp, store) = workspace("", &[("app", "deploy:\n  prod:\n  dev: {}\n")]);

        let ids: Vec<_> = store.deploys().unwrap().iter().map(Deployment::id).collect();

        assert_eq!(ids, vec!["dev.app"]);
    }

    #[test]
    fn test_malformed_yaml_fails_whole_call() {
        let (_temp, store) = workspace(
            "",
            &[("a", "deploy:\n  prod: {}\n"), ("b", "deploy: [unclosed\n")],
        );

        let err = store.deploys().unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
        assert!(err.to_string().contains("b.yml"));
    }

    #[test]
    fn test_null_override_clears_chart_and_lists() {
        let (_temp, store) = workspace(
            "",
            &[(
                "app",
                "chart: a-1.0.0.tgz\npreservePaths: [x]\ndeploy:\n  prod:\n    chart: ~\n    preservePaths: ~\n    namespace:\n      name:\n  dev: {}\n",
            )],
        );

        let prod = store.get_deploy("app", "prod").unwrap();
        assert!(prod.chart.is_empty());
        assert!(prod.preserve_paths.is_empty());
        assert!(prod.namespace.name.is_empty());

        let dev = store.get_deploy("app", "dev").unwrap();
        assert_eq!(dev.chart, "a-1.0.0.tgz");
        assert_eq!(dev.preserve_paths, vec!["x"]);
    }

    #[test]
    fn test_dotted_component_rejected() {
        let (_temp, store) = workspace("", &[("my.app", "deploy:\n  prod: {}\n")]);

        let err = store.deploys().unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
        let message = err.to_string();
        assert!(message.contains("my.app.yml"));
        assert!(message.contains("component name 'my.app'"));
    }

    #[test]
    fn test_dotted_environment_rejected() {
        let (_temp, store) = workspace("", &[("app", "deploy:\n  eu.west: {}\n")]);

        let err = store.deploys().unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
        assert!(err.to_string().contains("environment name 'eu.west'"));
    }

    #[test]
    fn test_get_deploy_not_found() {
        let (_temp, store) = workspace("", &[("app", "deploy:\n  prod: {}\n")]);

        let err = store.get_deploy("app", "staging").unwrap_err();
        assert_eq!(err.to_string(), "deploy staging.app not found");
    }

    #[test]
    fn test_set_creates_nested_path() {
        let (temp, store) = workspace("", &[("app", "")]);

        store
            .set("app.deploy.prod.values.image.tag", json!("v2"))
            .unwrap();
        store.set("app.deploy.prod.values.hosts.0.name", json!("a")).unwrap();

        let content = std::fs::read_to_string(temp.path().join("config/app.yml")).unwrap();
        let tree = Values::from_yaml(&content).unwrap();
        assert_eq!(tree.get("deploy.prod.values.image.tag").unwrap(), "v2");
        assert_eq!(tree.get("deploy.prod.values.hosts.0.name").unwrap(), "a");
    }

    #[test]
    fn test_set_missing_component_file() {
        let (_temp, store) = workspace("", &[]);

        assert!(matches!(
            store.set("nope.a", json!("x")).unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }

    #[test]
    fn test_init_creates_layout() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path().join("repo"));
        let store = ConfigStore::new(ws.clone());

        store.init(false, "labels: {}\n").unwrap();

        assert!(ws.config_dir().is_dir());
        assert!(ws.deploy_dir().is_dir());
        assert!(ws.charts_dir().is_dir());
        assert!(ws.with_dir().is_dir());
        assert_eq!(std::fs::read_to_string(ws.global_config()).unwrap(), "labels: {}\n");
        assert_eq!(std::fs::read_to_string(ws.lock_path()).unwrap(), "");
    }

    #[test]
    fn test_init_refuses_non_empty() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("README"), "x").unwrap();
        let store = ConfigStore::new(Workspace::new(temp.path()));

        assert!(matches!(store.init(false, "").unwrap_err(), CoreError::NotEmpty { .. }));
        store.init(true, "").unwrap();
    }

    #[test]
    fn test_manifest_and_chart_paths() {
        let ws = Workspace::new("/repo");
        let deploy = Deployment::from_values(Values(json!({"chart": "a-1.0.0.tgz"})), "app", "prod").unwrap();

        assert_eq!(
            ws.manifest_path(&deploy),
            PathBuf::from("/repo/deploy/prod/app/manifest.yaml")
        );
        assert_eq!(ws.chart_path(&deploy), PathBuf::from("/repo/charts/a-1.0.0.tgz"));
    }
}
