//! Schema flattening
//!
//! Turns a nested JSON Schema document into a [`SchemaSnapshot`]: one
//! [`FieldDescriptor`] per dotted field path. Only the declarative subset the
//! gate understands is read (`type`, `properties`, `required`, `enum`);
//! everything else in the document is ignored.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type label used when a node declares no recognizable type
pub const UNKNOWN_TYPE: &str = "unknown";

/// Flattened view of one schema at one revision, keyed by field path
pub type SchemaSnapshot = BTreeMap<String, FieldDescriptor>;

/// A single field of a flattened schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Dotted path (e.g., "customer.id")
    pub path: String,
    /// Normalized type label (e.g., "string", "number|string", "unknown")
    #[serde(rename = "type")]
    pub field_type: String,
    /// Whether the declaration admits `null`
    pub nullable: bool,
    /// Whether the parent lists this field as required
    pub required: bool,
    /// Allowed literal values, if constrained
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl FieldDescriptor {
    /// Type label with the nullable marker, as shown in change messages
    pub fn type_label(&self) -> String {
        if self.nullable {
            format!("{} (nullable)", self.field_type)
        } else {
            self.field_type.clone()
        }
    }
}

/// Normalize a `type` declaration into `(type, nullable)`.
///
/// A list of names becomes the sorted `|`-joined union of its non-null members.
pub fn normalize_type(declared: Option<&Value>) -> (String, bool) {
    match declared {
        Some(Value::String(name)) => (name.clone(), name == "null"),
        Some(Value::Array(names)) => {
            let names: Vec<&str> = names.iter().filter_map(Value::as_str).collect();
            let nullable = names.contains(&"null");
            let mut concrete: Vec<&str> = names.into_iter().filter(|n| *n != "null").collect();
            concrete.sort_unstable();
            concrete.dedup();
            if concrete.is_empty() {
                (UNKNOWN_TYPE.to_string(), nullable)
            } else {
                (concrete.join("|"), nullable)
            }
        }
        _ => (UNKNOWN_TYPE.to_string(), false),
    }
}

/// Flatten a schema document into a path-keyed snapshot.
///
/// The root itself is traversed but never recorded, and is never required.
pub fn flatten(schema: &Value) -> SchemaSnapshot {
    let mut snapshot = SchemaSnapshot::new();
    visit(Some(schema), "", &HashSet::new(), &mut snapshot);
    snapshot
}

fn visit(
    node: Option<&Value>,
    path: &str,
    required_paths: &HashSet<String>,
    snapshot: &mut SchemaSnapshot,
) {
    let node = match node {
        None | Some(Value::Null) => return,
        Some(node) => node,
    };

    if !path.is_empty() {
        let (field_type, nullable) = normalize_type(node.get("type"));
        let enum_values = node.get("enum").and_then(Value::as_array).cloned();
        snapshot.insert(
            path.to_string(),
            FieldDescriptor {
                path: path.to_string(),
                field_type,
                nullable,
                required: required_paths.contains(path),
                enum_values,
            },
        );
    }

    let Some(properties) = node.get("properties").and_then(Value::as_object) else {
        return;
    };

    let child_required: HashSet<String> = node
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(|name| join_path(path, name))
                .collect()
        })
        .unwrap_or_default();

    for (key, child) in properties {
        visit(Some(child), &join_path(path, key), &child_required, snapshot);
    }
}

/// Extend a dotted path with a child key
pub fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}
