//! Severity policy
//!
//! Maps each rule key to a [`Severity`], starting from the shared default
//! policy and tightening it with the overrides of every team that owns the
//! event. Overrides can only make a rule stricter.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// How strongly a change is gated, ordered `Pass < Warn < Block`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Pass,
    Warn,
    Block,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Pass => "pass",
            Severity::Warn => "warn",
            Severity::Block => "block",
        }
    }

    /// Strictest-wins merge
    pub fn strictest(self, other: Severity) -> Severity {
        self.max(other)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy rule keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKey {
    FieldRemovedRequired,
    FieldRemovedOptional,
    FieldAddedRequired,
    FieldAddedOptional,
    RequiredBecomesRequired,
    RequiredBecomesOptional,
    TypeChanged,
    EnumValueRemoved,
    EnumValueAdded,
    FileRemoved,
    FileAdded,
    InvalidJson,
}

impl RuleKey {
    pub const ALL: [RuleKey; 12] = [
        RuleKey::FieldRemovedRequired,
        RuleKey::FieldRemovedOptional,
        RuleKey::FieldAddedRequired,
        RuleKey::FieldAddedOptional,
        RuleKey::RequiredBecomesRequired,
        RuleKey::RequiredBecomesOptional,
        RuleKey::TypeChanged,
        RuleKey::EnumValueRemoved,
        RuleKey::EnumValueAdded,
        RuleKey::FileRemoved,
        RuleKey::FileAdded,
        RuleKey::InvalidJson,
    ];

    /// Key as written in policy documents
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKey::FieldRemovedRequired => "FIELD_REMOVED_REQUIRED",
            RuleKey::FieldRemovedOptional => "FIELD_REMOVED_OPTIONAL",
            RuleKey::FieldAddedRequired => "FIELD_ADDED_REQUIRED",
            RuleKey::FieldAddedOptional => "FIELD_ADDED_OPTIONAL",
            RuleKey::RequiredBecomesRequired => "REQUIRED_BECOMES_REQUIRED",
            RuleKey::RequiredBecomesOptional => "REQUIRED_BECOMES_OPTIONAL",
            RuleKey::TypeChanged => "TYPE_CHANGED",
            RuleKey::EnumValueRemoved => "ENUM_VALUE_REMOVED",
            RuleKey::EnumValueAdded => "ENUM_VALUE_ADDED",
            RuleKey::FileRemoved => "FILE_REMOVED",
            RuleKey::FileAdded => "FILE_ADDED",
            RuleKey::InvalidJson => "INVALID_JSON",
        }
    }

    /// Severity used when no policy document configures this rule
    pub fn builtin_severity(&self) -> Severity {
        match self {
            RuleKey::FieldRemovedRequired
            | RuleKey::FieldAddedRequired
            | RuleKey::RequiredBecomesRequired
            | RuleKey::TypeChanged
            | RuleKey::EnumValueRemoved
            | RuleKey::FileRemoved
            | RuleKey::InvalidJson => Severity::Block,
            RuleKey::FieldRemovedOptional | RuleKey::RequiredBecomesOptional => Severity::Warn,
            RuleKey::FieldAddedOptional | RuleKey::EnumValueAdded | RuleKey::FileAdded => {
                Severity::Pass
            }
        }
    }

    pub fn parse(name: &str) -> Option<RuleKey> {
        RuleKey::ALL.iter().copied().find(|rule| rule.as_str() == name)
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy document, e.g. `policy.json`:
///
/// ```json
/// {
///   "default": { "REQUIRED_BECOMES_OPTIONAL": "warn" },
///   "overridesByOwner": { "payments": { "REQUIRED_BECOMES_OPTIONAL": "block" } }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Rule key to severity, shared by every event
    #[serde(default)]
    pub default: BTreeMap<String, Severity>,

    /// Owner team to partial rule overrides
    #[serde(default)]
    pub overrides_by_owner: BTreeMap<String, BTreeMap<String, Severity>>,
}

impl PolicyConfig {
    /// Read a policy document
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read a policy document, falling back to built-in defaults when the file
    /// is missing, unreadable or malformed
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no policy file, using built-in defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable policy file");
                Self::default()
            }
        }
    }
}

/// Resolves effective severities against a loaded [`PolicyConfig`]
#[derive(Debug, Clone, Default)]
pub struct PolicyResolver {
    config: PolicyConfig,
}

impl PolicyResolver {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Effective severity of `rule` for an event owned by `owners`
    pub fn severity_for(&self, rule: RuleKey, owners: &[String]) -> Severity {
        self.severity_for_name(rule.as_str(), owners)
    }

    /// Same as [`severity_for`](Self::severity_for), keyed by the raw rule name.
    /// Names that are neither configured nor built in resolve to `warn`.
    pub fn severity_for_name(&self, rule: &str, owners: &[String]) -> Severity {
        let base = self
            .config
            .default
            .get(rule)
            .copied()
            .or_else(|| RuleKey::parse(rule).map(|r| r.builtin_severity()))
            .unwrap_or(Severity::Warn);

        owners
            .iter()
            .filter_map(|owner| self.config.overrides_by_owner.get(owner))
            .filter_map(|overrides| overrides.get(rule).copied())
            .fold(base, Severity::strictest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn resolver(json: &str) -> PolicyResolver {
        PolicyResolver::new(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_builtin_defaults_without_config() {
        let policy = PolicyResolver::default();
        assert_eq!(policy.severity_for(RuleKey::TypeChanged, &[]), Severity::Block);
        assert_eq!(policy.severity_for(RuleKey::FieldRemovedOptional, &[]), Severity::Warn);
        assert_eq!(policy.severity_for(RuleKey::FieldAddedOptional, &[]), Severity::Pass);
        assert_eq!(policy.severity_for(RuleKey::FileAdded, &[]), Severity::Pass);
        assert_eq!(policy.severity_for(RuleKey::InvalidJson, &[]), Severity::Block);
    }

    #[test]
    fn test_unrecognized_rule_defaults_to_warn() {
        let policy = PolicyResolver::default();
        assert_eq!(policy.severity_for_name("SOMETHING_ELSE", &[]), Severity::Warn);
    }

    #[test]
    fn test_configured_default_replaces_builtin() {
        let policy = resolver(r#"{ "default": { "TYPE_CHANGED": "warn" } }"#);
        assert_eq!(policy.severity_for(RuleKey::TypeChanged, &[]), Severity::Warn);
    }

    #[test]
    fn test_owner_override_tightens() {
        let policy = resolver(
            r#"{ "overridesByOwner": { "payments": { "REQUIRED_BECOMES_OPTIONAL": "block" } } }"#,
        );
        assert_eq!(
            policy.severity_for(RuleKey::RequiredBecomesOptional, &teams(&["payments"])),
            Severity::Block
        );
        assert_eq!(
            policy.severity_for(RuleKey::RequiredBecomesOptional, &teams(&["growth"])),
            Severity::Warn
        );
    }

    #[test]
    fn test_owner_override_never_loosens() {
        let policy = resolver(
            r#"{ "overridesByOwner": {
                "growth": { "FIELD_REMOVED_OPTIONAL": "pass", "TYPE_CHANGED": "pass" }
            } }"#,
        );
        let owners = teams(&["growth"]);
        assert_eq!(policy.severity_for(RuleKey::FieldRemovedOptional, &owners), Severity::Warn);
        assert_eq!(policy.severity_for(RuleKey::TypeChanged, &owners), Severity::Block);
    }

    #[test]
    fn test_strictest_owner_wins_regardless_of_order() {
        let policy = resolver(
            r#"{ "overridesByOwner": {
                "a": { "ENUM_VALUE_ADDED": "warn" },
                "b": { "ENUM_VALUE_ADDED": "block" }
            } }"#,
        );
        let forward = policy.severity_for(RuleKey::EnumValueAdded, &teams(&["a", "b"]));
        let reverse = policy.severity_for(RuleKey::EnumValueAdded, &teams(&["b", "a"]));
        assert_eq!(forward, Severity::Block);
        assert_eq!(reverse, Severity::Block);
    }

    #[test]
    fn test_invalid_severity_is_rejected() {
        let parsed: std::result::Result<PolicyConfig, _> =
            serde_json::from_str(r#"{ "default": { "TYPE_CHANGED": "fatal" } }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_rule_key_names_round_trip() {
        for rule in RuleKey::ALL {
            assert_eq!(RuleKey::parse(rule.as_str()), Some(rule));
        }
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("policy.json");
        assert!(PolicyConfig::load_or_default(&missing).default.is_empty());

        std::fs::write(&missing, "{ not json").unwrap();
        assert!(PolicyConfig::load_or_default(&missing).default.is_empty());
    }
}
