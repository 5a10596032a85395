//! Configuration management for the schema gate
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (event-diff.toml)
//! - Environment variables (EVENT_DIFF__*)
//!
//! ## Example config file (event-diff.toml):
//! ```toml
//! dir = "schemas"
//! repo = "."
//! policy_path = "policy.json"
//! owners_path = "owners.json"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ownership::OwnershipMap;
use crate::policy::{PolicyConfig, PolicyResolver};

/// Main configuration for a gate run
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Schema directory, relative to the project root
    #[serde(default = "default_dir")]
    pub dir: String,

    /// Repository (or, in local mode, the directory revisions are resolved against)
    #[serde(default = "default_repo")]
    pub repo: PathBuf,

    /// Policy document, relative to `repo` unless absolute
    #[serde(default = "default_policy_path")]
    pub policy_path: PathBuf,

    /// Ownership document, relative to `repo` unless absolute
    #[serde(default = "default_owners_path")]
    pub owners_path: PathBuf,
}

fn default_dir() -> String {
    "schemas".to_string()
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}

fn default_policy_path() -> PathBuf {
    PathBuf::from("policy.json")
}

fn default_owners_path() -> PathBuf {
    PathBuf::from("owners.json")
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            repo: default_repo(),
            policy_path: default_policy_path(),
            owners_path: default_owners_path(),
        }
    }
}

impl GateConfig {
    /// Load configuration, adding a specific file on top of the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["event-diff.toml", ".event-diff.toml", "config/event-diff.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        let project_dirs = directories::ProjectDirs::from("dev", "schema-gate", "event-diff");
        if let Some(config_dir) = project_dirs {
            let xdg_config = config_dir.config_dir().join("event-diff.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("EVENT_DIFF")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo.join(path)
        }
    }

    /// Resolved path of the policy document
    pub fn policy_file(&self) -> PathBuf {
        self.resolve(&self.policy_path)
    }

    /// Resolved path of the ownership document
    pub fn owners_file(&self) -> PathBuf {
        self.resolve(&self.owners_path)
    }

    /// Policy resolver for this run; an unusable policy file means built-in defaults
    pub fn policy(&self) -> PolicyResolver {
        PolicyResolver::new(PolicyConfig::load_or_default(self.policy_file()))
    }

    /// Ownership map for this run; an unusable ownership file means no owners
    pub fn ownership(&self) -> OwnershipMap {
        OwnershipMap::load_or_default(self.owners_file())
    }
}
