//! Event ownership
//!
//! `owners.json` maps an event name (the schema file name without its
//! extension) to the teams that own it:
//!
//! ```json
//! { "order_created": ["payments", "checkout"] }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnershipMap {
    owners: BTreeMap<String, Vec<String>>,
}

impl OwnershipMap {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read an ownership file; any failure yields an empty map
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no ownership file");
            return Self::default();
        }
        match Self::load(path) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable ownership file");
                Self::default()
            }
        }
    }

    /// Teams owning `event`, empty when unmapped
    pub fn owners_of(&self, event: &str) -> &[String] {
        self.owners.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Owners of the event a schema file describes
    pub fn owners_for_file(&self, file: &str) -> &[String] {
        self.owners_of(&event_name(file))
    }
}

/// Event name for a schema file: its base name without the extension
pub fn event_name(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
