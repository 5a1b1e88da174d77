//! Multi-document YAML manifest streams
//!
//! Documents are split on `---` lines. Comment lines preceding a document
//! body (`# Source: ...`) stay attached to it when the stream is rewritten.
//! Comments inside a body are not kept: bodies go through `serde_yaml`,
//! which has no comment model, so a `namespace` or `labels` rewrite drops
//! them. Documents that no action rewrites keep their text unchanged.
//! Bodies are edited as `serde_yaml::Value`, whose maps keep insertion
//! order, so existing fields are written back where they were and new
//! fields are appended.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use crate::error::Result;

const SEPARATOR: &str = "---";

/// Kinds that never carry a namespace
const CLUSTER_SCOPED: &[&str] = &[
    "APIService",
    "CSIDriver",
    "ClusterIssuer",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PriorityClass",
    "RuntimeClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
    "VolumeSnapshotClass",
];

/// One document of a stream
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Leading comment lines, without newlines
    pub comments: Vec<String>,
    pub body: Value,
}

impl Document {
    pub fn kind(&self) -> Option<&str> {
        self.body.get("kind").and_then(Value::as_str)
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.kind().is_some_and(|k| CLUSTER_SCOPED.contains(&k))
    }

    /// Set `metadata.namespace`
    ///
    /// An existing field is always rewritten; a missing one is only added
    /// when `create` is set.
    pub fn set_namespace(&mut self, namespace: &str, create: bool) {
        if matches!(self.kind(), Some("RoleBinding" | "ClusterRoleBinding")) {
            self.set_subject_namespaces(namespace);
        }
        if self.is_cluster_scoped() {
            return;
        }
        if let Some(metadata) = child_mapping(&mut self.body, "metadata", create) {
            let key = Value::from("namespace");
            if create || metadata.contains_key(&key) {
                metadata.insert(key, Value::from(namespace));
            }
        }
    }

    /// Point ServiceAccount subjects at `namespace`
    fn set_subject_namespaces(&mut self, namespace: &str) {
        let Some(subjects) = self.body.get_mut("subjects").and_then(Value::as_sequence_mut) else {
            return;
        };
        for subject in subjects {
            let is_sa = subject.get("kind").and_then(Value::as_str) == Some("ServiceAccount");
            if let (true, Some(map)) = (is_sa, subject.as_mapping_mut()) {
                map.insert(Value::from("namespace"), Value::from(namespace));
            }
        }
    }

    /// Merge labels into `metadata.labels` (created when absent) and into
    /// `spec.template.metadata.labels` (only when present)
    pub fn add_labels(&mut self, labels: &BTreeMap<String, String>) {
        if let Some(metadata) = child_mapping(&mut self.body, "metadata", true)
            && let Some(target) = mapping_entry(metadata, "labels", true)
        {
            merge_labels(target, labels);
        }

        let template_labels = self
            .body
            .get_mut("spec")
            .and_then(|spec| spec.get_mut("template"))
            .and_then(|template| template.get_mut("metadata"))
            .and_then(|metadata| metadata.get_mut("labels"))
            .and_then(Value::as_mapping_mut);
        if let Some(target) = template_labels {
            merge_labels(target, labels);
        }
    }

    fn render(&self) -> Result<String> {
        let mut out = String::new();
        for comment in &self.comments {
            out.push_str(comment);
            out.push('\n');
        }
        out.push_str(&serde_yaml::to_string(&self.body)?);
        Ok(out)
    }
}

fn merge_labels(target: &mut Mapping, labels: &BTreeMap<String, String>) {
    for (k, v) in labels {
        target.insert(Value::from(k.as_str()), Value::from(v.as_str()));
    }
}

/// Mapping stored under `key` of a mapping node
///
/// With `create`, a missing or null entry becomes an empty mapping.
fn child_mapping<'a>(node: &'a mut Value, key: &str, create: bool) -> Option<&'a mut Mapping> {
    mapping_entry(node.as_mapping_mut()?, key, create)
}

fn mapping_entry<'a>(map: &'a mut Mapping, key: &str, create: bool) -> Option<&'a mut Mapping> {
    let key = Value::from(key);
    let missing = map.get(&key).is_none_or(Value::is_null);
    if missing {
        if !create {
            return None;
        }
        map.insert(key.clone(), Value::Mapping(Mapping::new()));
    }
    map.get_mut(&key)?.as_mapping_mut()
}

/// Split a stream into documents
///
/// Documents whose body is empty or null are dropped.
pub fn parse(stream: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for chunk in split(stream) {
        let has_body = chunk.lines().any(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        });
        if !has_body {
            continue;
        }
        let comments: Vec<String> = chunk
            .lines()
            .take_while(|line| line.trim_start().starts_with('#') || line.trim().is_empty())
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        let body: Value = serde_yaml::from_str(&chunk)?;
        if body.is_null() {
            continue;
        }
        documents.push(Document { comments, body });
    }
    Ok(documents)
}

/// Write documents back as a stream, `---` between documents
pub fn render(documents: &[Document]) -> Result<String> {
    let mut out = String::new();
    for (i, doc) in documents.iter().enumerate() {
        if i > 0 {
            out.push_str(SEPARATOR);
            out.push('\n');
        }
        out.push_str(&doc.render()?);
    }
    Ok(out)
}

/// Parse, edit every document, render
pub fn rewrite(stream: &str, mut edit: impl FnMut(&mut Document)) -> Result<String> {
    let mut documents = parse(stream)?;
    documents.iter_mut().for_each(&mut edit);
    render(&documents)
}

fn split(stream: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in stream.lines() {
        if line.trim_end() == SEPARATOR {
            chunks.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    chunks.push(current);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_comments_and_drops_empty() {
        let docs = parse("---\n# Source: a\nkind: A\n---\n\n---\n# only a comment\n---\nkind: B\n").unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].comments, vec!["# Source: a"]);
        assert_eq!(docs[0].kind(), Some("A"));
        assert!(docs[1].comments.is_empty());
    }

    #[test]
    fn test_rewrite_keeps_leading_comments_only() {
        let input = "# Source: chart/templates/cm.yaml\nkind: ConfigMap\n# inline note\nmetadata:\n  name: cm # trailing\n";

        let out = rewrite(input, |d| d.set_namespace("apps", true)).unwrap();

        assert_eq!(
            out,
            "# Source: chart/templates/cm.yaml\nkind: ConfigMap\nmetadata:\n  name: cm\n  namespace: apps\n"
        );
    }

    #[test]
    fn test_render_separates_documents() {
        let docs = parse("# Source: a\nkind: A\n---\nkind: B\n").unwrap();
        assert_eq!(render(&docs).unwrap(), "# Source: a\nkind: A\n---\nkind: B\n");
    }

    #[test]
    fn test_set_namespace_creates_when_asked() {
        let out = rewrite("---\n# Source: t\ntest: true\n", |d| d.set_namespace("test", true)).unwrap();
        assert_eq!(out, "# Source: t\ntest: true\nmetadata:\n  namespace: test\n");
    }

    #[test]
    fn test_set_namespace_rewrites_existing_only() {
        let input = "kind: A\nmetadata:\n  name: a\n  namespace: old\n---\nkind: B\nmetadata:\n  name: b\n";
        let out = rewrite(input, |d| d.set_namespace("new", false)).unwrap();

        assert_eq!(
            out,
            "kind: A\nmetadata:\n  name: a\n  namespace: new\n---\nkind: B\nmetadata:\n  name: b\n"
        );
    }

    #[test]
    fn test_set_namespace_skips_cluster_scoped() {
        let input = "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: test\n";
        let out = rewrite(input, |d| d.set_namespace("other", true)).unwrap();

        assert_eq!(out, input);
    }

    #[test]
    fn test_set_namespace_updates_service_account_subjects() {
        let input = "kind: ClusterRoleBinding\nsubjects:\n- kind: ServiceAccount\n  name: sa\n  namespace: default\n- kind: User\n  name: bob\n";
        let out = rewrite(input, |d| d.set_namespace("apps", true)).unwrap();
        let docs = parse(&out).unwrap();

        let subjects = docs[0].body["subjects"].as_sequence().unwrap();
        assert_eq!(subjects[0]["namespace"].as_str(), Some("apps"));
        assert!(subjects[1].get("namespace").is_none());
        assert!(docs[0].body.get("metadata").is_none());
    }

    #[test]
    fn test_add_labels() {
        let labels = BTreeMap::from([("team".to_string(), "ops".to_string())]);
        let input = "kind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    metadata:\n      labels:\n        app: web\n---\nkind: Service\nspec:\n  template: {}\n";

        let out = rewrite(input, |d| d.add_labels(&labels)).unwrap();
        let docs = parse(&out).unwrap();

        assert_eq!(docs[0].body["metadata"]["labels"]["team"].as_str(), Some("ops"));
        assert_eq!(docs[0].body["spec"]["template"]["metadata"]["labels"]["team"].as_str(), Some("ops"));
        assert_eq!(docs[0].body["spec"]["template"]["metadata"]["labels"]["app"].as_str(), Some("web"));
        assert_eq!(docs[1].body["metadata"]["labels"]["team"].as_str(), Some("ops"));
        assert!(docs[1].body["spec"]["template"].get("metadata").is_none());
    }
}
