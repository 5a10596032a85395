//! Schema compatibility checking
//!
//! Compares two flattened snapshots field by field and classifies every
//! difference as a [`ChangeRecord`] whose severity comes from the policy.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::{PolicyResolver, RuleKey, Severity};
use crate::schema::{FieldDescriptor, SchemaSnapshot};

/// Kind of a detected change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    FieldRemoved,
    FieldAdded,
    RequiredBecomesRequired,
    RequiredBecomesOptional,
    TypeChanged,
    EnumValueRemoved,
    EnumValueAdded,
    FileAdded,
    FileRemoved,
    InvalidJson,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::FieldRemoved => "FIELD_REMOVED",
            ChangeKind::FieldAdded => "FIELD_ADDED",
            ChangeKind::RequiredBecomesRequired => "REQUIRED_BECOMES_REQUIRED",
            ChangeKind::RequiredBecomesOptional => "REQUIRED_BECOMES_OPTIONAL",
            ChangeKind::TypeChanged => "TYPE_CHANGED",
            ChangeKind::EnumValueRemoved => "ENUM_VALUE_REMOVED",
            ChangeKind::EnumValueAdded => "ENUM_VALUE_ADDED",
            ChangeKind::FileAdded => "FILE_ADDED",
            ChangeKind::FileRemoved => "FILE_REMOVED",
            ChangeKind::InvalidJson => "INVALID_JSON",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected change between two revisions of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    /// Field path, or the file path for file-level changes
    pub path: String,
    pub severity: Severity,
    /// Human-readable description; CI log scrapers match on this text
    pub message: String,
}

/// Binary gate decision for a file or a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Pass,
    Fail,
}

/// Severity counts plus the resulting decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub decision: Decision,
    pub blocks: usize,
    pub warns: usize,
    pub passes: usize,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            decision: Decision::Pass,
            blocks: 0,
            warns: 0,
            passes: 0,
        }
    }
}

impl Summary {
    pub fn from_changes(changes: &[ChangeRecord]) -> Self {
        changes.iter().fold(Self::default(), |mut summary, change| {
            match change.severity {
                Severity::Block => summary.blocks += 1,
                Severity::Warn => summary.warns += 1,
                Severity::Pass => summary.passes += 1,
            }
            summary.with_decision()
        })
    }

    /// Add another summary's counts to this one
    pub fn absorb(self, other: &Summary) -> Self {
        Self {
            blocks: self.blocks + other.blocks,
            warns: self.warns + other.warns,
            passes: self.passes + other.passes,
            ..self
        }
        .with_decision()
    }

    fn with_decision(mut self) -> Self {
        self.decision = if self.blocks > 0 {
            Decision::Fail
        } else {
            Decision::Pass
        };
        self
    }

    /// Three-way label for console output: `FAIL`, `WARN` or `PASS`
    pub fn label(&self) -> &'static str {
        if self.blocks > 0 {
            "FAIL"
        } else if self.warns > 0 {
            "WARN"
        } else {
            "PASS"
        }
    }
}

/// Changes found in one schema file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub summary: Summary,
    pub changes: Vec<ChangeRecord>,
}

impl SchemaDiff {
    pub fn new(changes: Vec<ChangeRecord>) -> Self {
        Self {
            summary: Summary::from_changes(&changes),
            changes,
        }
    }
}

/// Result of comparing two enum lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumDiff {
    pub removed: Vec<Value>,
    pub added: Vec<Value>,
}

/// Values removed from and added to an enum, each deduplicated and sorted
pub fn enum_diff(old: Option<&[Value]>, new: Option<&[Value]>) -> EnumDiff {
    let old = old.unwrap_or_default();
    let new = new.unwrap_or_default();

    EnumDiff {
        removed: sorted_difference(old, new),
        added: sorted_difference(new, old),
    }
}

/// Membership key for a JSON literal; serde_json renders equal values identically
fn literal_key(value: &Value) -> String {
    value.to_string()
}

fn sorted_difference(from: &[Value], without: &[Value]) -> Vec<Value> {
    let excluded: HashSet<String> = without.iter().map(literal_key).collect();
    let mut seen: HashSet<String> = HashSet::new();

    let mut values: Vec<Value> = from
        .iter()
        .filter(|value| {
            let key = literal_key(value);
            !excluded.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect();
    values.sort_by(compare_values);
    values
}

/// Natural ordering of JSON literals: numbers numerically, strings
/// lexicographically, and mixed kinds by kind
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

/// Render enum values for a message: strings bare, everything else as JSON
pub fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Field-level differ for one schema file
pub struct SchemaDiffer<'a> {
    policy: &'a PolicyResolver,
}

impl<'a> SchemaDiffer<'a> {
    pub fn new(policy: &'a PolicyResolver) -> Self {
        Self { policy }
    }

    /// Compare two snapshots of the same schema.
    ///
    /// Changes are ordered by field path; within one path the order is
    /// required-flag, type, enum removals, enum additions.
    pub fn diff(
        &self,
        old: &SchemaSnapshot,
        new: &SchemaSnapshot,
        owners: &[String],
    ) -> SchemaDiff {
        let paths: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        let mut changes = Vec::new();

        for path in paths {
            match (old.get(path), new.get(path)) {
                (Some(before), None) => {
                    let (rule, label) = if before.required {
                        (RuleKey::FieldRemovedRequired, "required")
                    } else {
                        (RuleKey::FieldRemovedOptional, "optional")
                    };
                    changes.push(self.record(
                        ChangeKind::FieldRemoved,
                        rule,
                        path,
                        owners,
                        format!("Field removed '{}' ({})", path, label),
                    ));
                }
                (None, Some(after)) => {
                    let (rule, label) = if after.required {
                        (RuleKey::FieldAddedRequired, "required")
                    } else {
                        (RuleKey::FieldAddedOptional, "optional")
                    };
                    changes.push(self.record(
                        ChangeKind::FieldAdded,
                        rule,
                        path,
                        owners,
                        format!("Field added '{}' ({})", path, label),
                    ));
                }
                (Some(before), Some(after)) => {
                    self.diff_field(before, after, owners, &mut changes);
                }
                (None, None) => {}
            }
        }

        SchemaDiff::new(changes)
    }

    fn diff_field(
        &self,
        before: &FieldDescriptor,
        after: &FieldDescriptor,
        owners: &[String],
        changes: &mut Vec<ChangeRecord>,
    ) {
        let path = &before.path;

        if before.required != after.required {
            let change = if after.required {
                self.record(
                    ChangeKind::RequiredBecomesRequired,
                    RuleKey::RequiredBecomesRequired,
                    path,
                    owners,
                    format!("Field became required '{}'", path),
                )
            } else {
                self.record(
                    ChangeKind::RequiredBecomesOptional,
                    RuleKey::RequiredBecomesOptional,
                    path,
                    owners,
                    format!("Field became optional '{}'", path),
                )
            };
            changes.push(change);
        }

        if before.field_type != after.field_type || before.nullable != after.nullable {
            changes.push(self.record(
                ChangeKind::TypeChanged,
                RuleKey::TypeChanged,
                path,
                owners,
                format!(
                    "Type changed '{}': {} → {}",
                    path,
                    before.type_label(),
                    after.type_label()
                ),
            ));
        }

        let diff = enum_diff(before.enum_values.as_deref(), after.enum_values.as_deref());
        if !diff.removed.is_empty() {
            changes.push(self.record(
                ChangeKind::EnumValueRemoved,
                RuleKey::EnumValueRemoved,
                path,
                owners,
                format!("Enum values removed from '{}': {}", path, join_values(&diff.removed)),
            ));
        }
        if !diff.added.is_empty() {
            changes.push(self.record(
                ChangeKind::EnumValueAdded,
                RuleKey::EnumValueAdded,
                path,
                owners,
                format!("Enum values added to '{}': {}", path, join_values(&diff.added)),
            ));
        }
    }

    fn record(
        &self,
        kind: ChangeKind,
        rule: RuleKey,
        path: &str,
        owners: &[String],
        message: String,
    ) -> ChangeRecord {
        ChangeRecord {
            kind,
            path: path.to_string(),
            severity: self.policy.severity_for(rule, owners),
            message,
        }
    }
}
