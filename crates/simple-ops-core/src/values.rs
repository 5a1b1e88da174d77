//! Untyped configuration trees with deep merge and dotted-path mutation
//!
//! Configuration is merged while it is still untyped so that "replace this
//! subtree, inherit that one" can be expressed before a schema is imposed.
//! Decoding into a [`crate::Deployment`] happens only after all merging.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use crate::error::{CoreError, Result};

/// Values container with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(Map::new()))
    }

    /// Load values from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from YAML string
    ///
    /// An empty document yields an empty map rather than null.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(match value {
            JsonValue::Null => Self::new(),
            other => Self(other),
        })
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// Return a new tree with `overlay` merged over `self`
    ///
    /// Neither input is modified. See [`merge_values`] for the rules.
    #[must_use]
    pub fn merged(&self, overlay: &Values) -> Values {
        Values(merge_values(&self.0, &overlay.0))
    }

    /// Deep merge another Values into this one
    pub fn merge(&mut self, overlay: &Values) {
        self.0 = merge_values(&self.0, &overlay.0);
    }

    /// Set a value by dotted path (e.g., "image.tag" or "hosts.0.name")
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        set_path(&mut self.0, &parts, value).map_err(|message| CoreError::InvalidSetPath {
            path: path.to_string(),
            message,
        })
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Top-level map, if the tree is one
    pub fn as_map(&self) -> Option<&Map<String, JsonValue>> {
        self.0.as_object()
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }
}

impl From<JsonValue> for Values {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

/// Merge two maps, `overlay` winning
///
/// Rules:
/// - both sides maps: recursive merge
/// - overlay null over a base map: the base map is kept
/// - anything else: overlay replaces base wholesale, including lists
///   and falsy scalars (`false`, `0`, `""`)
pub fn merge_maps(base: &Map<String, JsonValue>, overlay: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    let mut out = base.clone();
    for (key, value) in overlay {
        let merged = match (out.get(key), value) {
            (Some(JsonValue::Object(b)), JsonValue::Object(o)) => JsonValue::Object(merge_maps(b, o)),
            (Some(JsonValue::Object(b)), JsonValue::Null) => JsonValue::Object(b.clone()),
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Merge two arbitrary trees, `overlay` winning
pub fn merge_values(base: &JsonValue, overlay: &JsonValue) -> JsonValue {
    match (base, overlay) {
        (JsonValue::Object(b), JsonValue::Object(o)) => JsonValue::Object(merge_maps(b, o)),
        (JsonValue::Object(_), JsonValue::Null) => base.clone(),
        _ => overlay.clone(),
    }
}

/// Set `value` at `path` inside `node`, creating intermediate containers
///
/// Numeric segments address list elements. When a container has to be
/// created, the following segment decides its type: a list sized to hold
/// the index, or an empty map. Errors are returned as plain messages and
/// wrapped by the caller with the full path.
pub fn set_path(node: &mut JsonValue, path: &[&str], value: JsonValue) -> std::result::Result<(), String> {
    if path.is_empty() {
        return Err("0 length path".to_string());
    }
    if let Some(neg) = path.iter().find(|p| matches!(p.parse::<i64>(), Ok(i) if i < 0)) {
        return Err(format!("index {} less than 0", neg));
    }
    set_nested(node, path, value)
}

fn set_nested(node: &mut JsonValue, path: &[&str], value: JsonValue) -> std::result::Result<(), String> {
    let key = path[0];
    let remaining = &path[1..];

    let slot = match node {
        JsonValue::Object(map) => {
            if remaining.is_empty() {
                map.insert(key.to_string(), value);
                return Ok(());
            }
            map.entry(key.to_string()).or_insert(JsonValue::Null)
        }
        JsonValue::Array(list) => {
            let index = parse_index(key)?;
            if list.len() <= index {
                list.resize(list_len(index)?, JsonValue::Null);
            }
            if remaining.is_empty() {
                list[index] = value;
                return Ok(());
            }
            &mut list[index]
        }
        _ => return Err(format!("unhandled type at '{}'", key)),
    };

    if slot.is_null() {
        *slot = container_for(remaining[0])?;
    }
    set_nested(slot, remaining, value)
}

/// Largest list index `set_path` will pad up to
pub const MAX_LIST_INDEX: usize = 10_000;

fn parse_index(segment: &str) -> std::result::Result<usize, String> {
    segment
        .parse::<usize>()
        .map_err(|_| format!("'{}' is not a list index", segment))
}

/// Length of a list that holds `index`, bounded before anything is allocated
fn list_len(index: usize) -> std::result::Result<usize, String> {
    index
        .checked_add(1)
        .filter(|_| index <= MAX_LIST_INDEX)
        .ok_or_else(|| format!("index {} out of range", index))
}

fn container_for(next: &str) -> std::result::Result<JsonValue, String> {
    if !next.is_empty() && next.bytes().all(|b| b.is_ascii_digit()) {
        let index = parse_index(next).map_err(|_| format!("index {} out of range", next))?;
        return Ok(JsonValue::Array(vec![JsonValue::Null; list_len(index)?]));
    }
    match next.parse::<i64>() {
        Ok(i) if i < 0 => Err("index less than 0".to_string()),
        _ => Ok(JsonValue::Object(Map::new())),
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return Some(value);
    }

    let key = path[0];
    let remaining = &path[1..];

    match value {
        JsonValue::Object(map) => map.get(key).and_then(|v| get_nested(v, remaining)),
        JsonValue::Array(list) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| list.get(i))
            .and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}
