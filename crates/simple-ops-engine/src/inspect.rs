//! Read-only queries over generated manifests and chart archives
//!
//! Workload kinds are visited in a fixed order (CronJob, Pod, then the pod
//! template kinds), then by container list, then in document order.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use simple_ops_core::{Deployment, Workspace};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;

use crate::chart::Chart;
use crate::documents::{self, Document};
use crate::error::{EngineError, Result};

const POD_SPEC: &[&str] = &["spec"];
const POD_TEMPLATE_SPEC: &[&str] = &["spec", "template", "spec"];
const JOB_TEMPLATE_SPEC: &[&str] = &["spec", "jobTemplate", "spec", "template", "spec"];

const CONTAINER_LISTS: [&str; 3] = ["containers", "initContainers", "ephemeralContainers"];

/// Workload kinds and where their pod spec lives
const WORKLOADS: [(&str, &[&str]); 8] = [
    ("CronJob", JOB_TEMPLATE_SPEC),
    ("Pod", POD_SPEC),
    ("Deployment", POD_TEMPLATE_SPEC),
    ("DaemonSet", POD_TEMPLATE_SPEC),
    ("Job", POD_TEMPLATE_SPEC),
    ("ReplicaSet", POD_TEMPLATE_SPEC),
    ("ReplicationController", POD_TEMPLATE_SPEC),
    ("StatefulSet", POD_TEMPLATE_SPEC),
];

/// A container entry and the workload that declares it
#[derive(Debug, Clone, Copy)]
pub struct Container<'a> {
    pub parent: &'a Document,
    pub spec: &'a Value,
}

impl Container<'_> {
    pub fn image(&self) -> Option<&str> {
        self.spec.get("image").and_then(Value::as_str)
    }
}

/// Every container of every workload in `docs`
pub fn containers(docs: &[Document]) -> Vec<Container<'_>> {
    let mut found = Vec::new();
    for (kind, pod_spec) in WORKLOADS {
        for list in CONTAINER_LISTS {
            for doc in docs.iter().filter(|d| d.kind() == Some(kind)) {
                let Some(entries) = lookup(&doc.body, pod_spec)
                    .and_then(|spec| spec.get(list))
                    .and_then(Value::as_sequence)
                else {
                    continue;
                };
                found.extend(entries.iter().map(|spec| Container { parent: doc, spec }));
            }
        }
    }
    found
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Image of every container, duplicates included
pub fn images(docs: &[Document]) -> Vec<String> {
    containers(docs)
        .iter()
        .filter_map(|c| c.image().map(str::to_string))
        .collect()
}

/// Drop repeated entries, keeping the first occurrence
pub fn unique(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

/// `resources` of a container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub limits: BTreeMap<String, Value>,
    #[serde(default)]
    pub requests: BTreeMap<String, Value>,
}

/// Resource configuration of one container
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerResources {
    pub name: String,
    pub parent_name: String,
    pub parent_type: String,
    pub resources: Resources,
}

/// Resource configuration of every container in `docs`
pub fn container_resources(docs: &[Document]) -> Result<Vec<ContainerResources>> {
    containers(docs)
        .into_iter()
        .map(|c| {
            let resources = match c.spec.get("resources") {
                Some(value) if !value.is_null() => serde_yaml::from_value(value.clone())?,
                _ => Resources::default(),
            };
            Ok(ContainerResources {
                name: str_at(c.spec, &["name"]).trim().to_string(),
                parent_name: str_at(&c.parent.body, &["metadata", "name"]).to_string(),
                parent_type: c.parent.kind().unwrap_or_default().to_string(),
                resources,
            })
        })
        .collect()
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> &'a str {
    lookup(value, path).and_then(Value::as_str).unwrap_or_default()
}

/// Documents of a deployment's generated manifest
pub fn generated_documents(workspace: &Workspace, deploy: &Deployment) -> Result<Vec<Document>> {
    let path = workspace.manifest_path(deploy);
    let stream = fs::read_to_string(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => io::Error::new(
            e.kind(),
            format!("{} does not exist, run generate first", path.display()),
        ),
        _ => e,
    })?;
    documents::parse(&stream)
}

/// Parts of a chart that `show` can print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartPart {
    Chart,
    Values,
    Readme,
    Crds,
    All,
}

/// Raw text of one part of a deployment's chart
pub fn show_chart(workspace: &Workspace, deploy: &Deployment, part: ChartPart) -> Result<String> {
    if deploy.chart.is_empty() {
        return Err(EngineError::Chart {
            chart: deploy.id(),
            message: "deployment has no chart".to_string(),
        });
    }
    let chart = Chart::load(&workspace.chart_path(deploy))?;
    Ok(match part {
        ChartPart::Chart => chart.chart_yaml(),
        ChartPart::Values => chart.values_yaml(),
        ChartPart::Readme => chart.readme(),
        ChartPart::Crds => chart.crds_yaml(),
        ChartPart::All => [chart.chart_yaml(), chart.values_yaml(), chart.readme(), chart.crds_yaml()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(|part| terminated(&part))
            .collect::<Vec<_>>()
            .join("---\n"),
    })
}

fn terminated(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // workload samples from the Kubernetes documentation
    const WORKLOADS_YAML: &str = r#"apiVersion: v1
kind: Pod
metadata:
  name: nginx
spec:
  containers:
  - name: nginx
    image: nginx:1.14.2
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: nginx-deployment
spec:
  template:
    spec:
      containers:
      - name: nginx
        image: nginx:1.14.2
---
apiVersion: apps/v1
kind: ReplicaSet
metadata:
  name: frontend
spec:
  template:
    spec:
      containers:
      - name: php-redis
        image: gcr.io/google_samples/gb-frontend:v3
---
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: web
spec:
  template:
    spec:
      containers:
      - name: nginx
        image: k8s.gcr.io/nginx-slim:0.8
  volumeClaimTemplates:
  - metadata:
      name: www
    spec:
      resources:
        requests:
          storage: 1Gi
---
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: fluentd-elasticsearch
spec:
  template:
    spec:
      containers:
      - name: fluentd-elasticsearch
        image: quay.io/fluentd_elasticsearch/fluentd:v2.5.2
        resources:
          limits:
            memory: 200Mi
          requests:
            cpu: 100m
            memory: 200Mi
---
apiVersion: batch/v1
kind: Job
metadata:
  name: pi
spec:
  template:
    spec:
      containers:
      - name: pi
        image: perl
---
apiVersion: v1
kind: ReplicationController
metadata:
  name: nginx
spec:
  template:
    spec:
      containers:
      - name: nginx
        image: nginx
        resources:
          limits:
            memory: 20Mi
          requests:
            cpu: 10m
            memory: 10Mi
---
apiVersion: batch/v1
kind: CronJob
metadata:
  name: hello
spec:
  jobTemplate:
    spec:
      template:
        spec:
          containers:
          - name: hello
            image: busybox:1.28
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: not-a-workload
data:
  image: ignored
"#;

    fn docs() -> Vec<Document> {
        documents::parse(WORKLOADS_YAML).unwrap()
    }

    #[test]
    fn test_images_in_workload_order() {
        assert_eq!(
            images(&docs()),
            vec![
                "busybox:1.28",
                "nginx:1.14.2",
                "nginx:1.14.2",
                "quay.io/fluentd_elasticsearch/fluentd:v2.5.2",
                "perl",
                "gcr.io/google_samples/gb-frontend:v3",
                "nginx",
                "k8s.gcr.io/nginx-slim:0.8",
            ]
        );
    }

    #[test]
    fn test_unique_keeps_first_occurrence() {
        let items = ["c", "a", "b", "a", "b", "b", "d"].map(String::from);
        assert_eq!(unique(items), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_init_containers_follow_containers() {
        let docs = documents::parse(
            "kind: Pod\nmetadata:\n  name: p\nspec:\n  initContainers:\n  - name: init\n    image: busybox\n  containers:\n  - name: app\n    image: app:1\n",
        )
        .unwrap();

        assert_eq!(images(&docs), vec!["app:1", "busybox"]);
    }

    #[test]
    fn test_container_resources() {
        let resources = container_resources(&docs()).unwrap();

        let summary: Vec<_> = resources
            .iter()
            .map(|r| (r.parent_type.as_str(), r.parent_name.as_str(), r.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("CronJob", "hello", "hello"),
                ("Pod", "nginx", "nginx"),
                ("Deployment", "nginx-deployment", "nginx"),
                ("DaemonSet", "fluentd-elasticsearch", "fluentd-elasticsearch"),
                ("Job", "pi", "pi"),
                ("ReplicaSet", "frontend", "php-redis"),
                ("ReplicationController", "nginx", "nginx"),
                ("StatefulSet", "web", "nginx"),
            ]
        );

        let daemonset = &resources[3];
        assert_eq!(daemonset.resources.limits["memory"], Value::from("200Mi"));
        assert!(!daemonset.resources.limits.contains_key("cpu"));
        assert_eq!(daemonset.resources.requests["cpu"], Value::from("100m"));
        assert_eq!(resources[0].resources, Resources::default());
    }

    #[test]
    fn test_container_resources_yaml_shape() {
        let docs = documents::parse(
            "kind: Deployment\nmetadata:\n  name: metrics-server\nspec:\n  template:\n    spec:\n      containers:\n      - name: metrics-server\n        image: ms:0.6.1\n",
        )
        .unwrap();

        let yaml = serde_yaml::to_string(&container_resources(&docs).unwrap()).unwrap();

        assert_eq!(
            yaml,
            "- name: metrics-server\n  parentName: metrics-server\n  parentType: Deployment\n  resources:\n    limits: {}\n    requests: {}\n"
        );
    }
}
