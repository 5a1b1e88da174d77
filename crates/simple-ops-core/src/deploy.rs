//! Fully resolved deployment records
//!
//! A [`Deployment`] is decoded from a merged configuration tree for one
//! (component, environment) pair. It is immutable once built and is never
//! written back to disk; only its rendered manifests are.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::values::Values;

/// One named step of a deployment's manifest chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Action {
    /// Render the configured chart
    Helm,
    /// Instantiate `with` templates
    With,
    /// Rewrite `metadata.namespace`
    Namespace,
    /// Merge resource labels
    Labels,
    /// Apply kustomize overlays to the staged manifest
    Kustomize,
    /// Append Jsonnet program output
    Jsonnet,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Helm,
        Action::With,
        Action::Namespace,
        Action::Labels,
        Action::Kustomize,
        Action::Jsonnet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Helm => "helm",
            Action::With => "with",
            Action::Namespace => "namespace",
            Action::Labels => "labels",
            Action::Kustomize => "kustomize",
            Action::Jsonnet => "jsonnet",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAction {
                name: s.to_string(),
            })
    }
}

impl TryFrom<String> for Action {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Chain used when a deployment does not configure one
pub fn default_chain() -> Vec<Action> {
    vec![
        Action::Helm,
        Action::With,
        Action::Labels,
        Action::Namespace,
        Action::Kustomize,
        Action::Jsonnet,
    ]
}

/// Namespace settings of a deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespace {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Emit a Namespace manifest as the first document
    #[serde(deserialize_with = "null_as_default")]
    pub create: bool,
    /// Add `metadata.namespace` to documents that lack it
    #[serde(deserialize_with = "null_as_default")]
    pub inject: bool,
    /// Extra labels for the generated Namespace manifest
    #[serde(deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
}

/// One instantiation of a `with` template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WithInstance {
    /// Output path relative to the staging root; empty means inline
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    /// Values merged over the template document
    pub values: Values,
}

/// Template groups keyed by group name, then instance name
pub type WithTemplates = BTreeMap<String, BTreeMap<String, WithInstance>>;

/// A named Jsonnet program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonnetProgram {
    /// Program file relative to the workspace root
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    /// Inline snippet
    #[serde(deserialize_with = "null_as_default")]
    pub inline: String,
    /// Treat the file output as one document per top-level key
    #[serde(deserialize_with = "null_as_default")]
    pub multi: bool,
    /// External variables (`std.extVar`)
    #[serde(deserialize_with = "null_as_default")]
    pub values: BTreeMap<String, String>,
}

/// The fully resolved configuration for one (component, environment) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default, skip_deserializing)]
    pub component: String,

    #[serde(default, skip_deserializing)]
    pub environment: String,

    /// Chart archive or directory under `charts/`; empty disables rendering
    #[serde(default, deserialize_with = "null_as_default")]
    pub chart: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub disabled: bool,

    #[serde(default, deserialize_with = "null_as_default")]
    pub namespace: Namespace,

    /// Labels applied to every manifest by the `labels` action
    #[serde(default, rename = "labels", deserialize_with = "null_as_default")]
    pub resource_labels: BTreeMap<String, String>,

    /// Values passed to chart rendering
    #[serde(default)]
    pub values: Values,

    #[serde(default, rename = "with", deserialize_with = "with_templates")]
    pub with_templates: WithTemplates,

    /// Kustomization documents; `resources` is replaced at apply time
    #[serde(default, deserialize_with = "null_as_default")]
    pub kustomizations: Vec<Values>,

    #[serde(default, rename = "jsonnet", deserialize_with = "null_as_default")]
    pub jsonnet_programs: BTreeMap<String, JsonnetProgram>,

    /// Paths copied verbatim into the staging root before kustomize runs
    #[serde(default, deserialize_with = "null_as_default")]
    pub preserve_paths: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub kustomization_paths: Vec<String>,

    #[serde(default = "default_chain", deserialize_with = "null_as_default_chain")]
    pub chain: Vec<Action>,
}

impl Deployment {
    /// Decode a merged configuration tree
    pub fn from_values(values: Values, component: &str, environment: &str) -> Result<Self> {
        let mut deploy: Deployment = serde_json::from_value(values.into_inner())?;
        deploy.component = component.to_string();
        deploy.environment = environment.to_string();
        Ok(deploy)
    }

    /// `environment.component`
    pub fn id(&self) -> String {
        format!("{}.{}", self.environment, self.component)
    }
}

/// Split `environment.component` into its two parts
pub fn parse_deploy_id(id: &str) -> Result<(String, String)> {
    match id.split('.').collect::<Vec<_>>().as_slice() {
        [env, comp] if !env.is_empty() && !comp.is_empty() => Ok((env.to_string(), comp.to_string())),
        _ => Err(CoreError::InvalidDeployId { id: id.to_string() }),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_chain<'de, D>(deserializer: D) -> std::result::Result<Vec<Action>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Action>>::deserialize(deserializer)?.unwrap_or_else(default_chain))
}

/// `with:` allows bare instance names (`github:` with no body)
fn with_templates<'de, D>(deserializer: D) -> std::result::Result<WithTemplates, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<BTreeMap<String, Option<WithInstance>>>>> =
        Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(group, instances)| {
            let instances = instances
                .unwrap_or_default()
                .into_iter()
                .map(|(name, w)| (name, w.unwrap_or_default()))
                .collect();
            (group, instances)
        })
        .collect())
}
