//! Gate reports and their console rendering
//!
//! The console layout is consumed by CI automation, so line order and prefixes
//! are fixed: summary, owners, action hint, `BLOCK:` lines, `WARN:` lines, then
//! the full report as pretty-printed JSON.

use serde::{Deserialize, Serialize};

use crate::compatibility::{ChangeRecord, Decision, Summary};
use crate::error::Result;
use crate::ownership::OwnershipMap;
use crate::policy::Severity;

/// Outcome for one changed schema file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub file: String,
    pub summary: Summary,
    pub changes: Vec<ChangeRecord>,
}

/// Outcome of a whole gate run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub base: String,
    pub head: String,
    pub dir: String,
    pub summary: Summary,
    pub reports: Vec<FileReport>,
}

impl RunReport {
    /// Process exit code: 1 when anything blocks, 0 otherwise
    pub fn exit_code(&self) -> i32 {
        match self.summary.decision {
            Decision::Fail => 1,
            Decision::Pass => 0,
        }
    }

    /// Every change of the run, in file order then change order
    pub fn changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.reports.iter().flat_map(|report| report.changes.iter())
    }

    /// Owners of all changed events, deduplicated in first-seen order
    pub fn owners(&self, ownership: &OwnershipMap) -> Vec<String> {
        let mut owners: Vec<String> = Vec::new();
        for report in &self.reports {
            for team in ownership.owners_for_file(&report.file) {
                if !owners.contains(team) {
                    owners.push(team.clone());
                }
            }
        }
        owners
    }

    /// Render the console report
    pub fn render(&self, ownership: &OwnershipMap) -> Result<String> {
        let owners = self.owners(ownership);
        let mut out = String::new();

        out.push_str(&format!(
            "EventDiff: {} | blocks={} warns={} passes={}\n",
            self.summary.label(),
            self.summary.blocks,
            self.summary.warns,
            self.summary.passes
        ));

        if owners.is_empty() {
            out.push_str("Owner: (none configured)\n");
        } else {
            out.push_str(&format!("Owner: {}\n", owners.join(", ")));
        }

        let action = if self.reports.is_empty() {
            "No schema changes detected"
        } else if owners.is_empty() {
            "Add owners.json mapping for this event"
        } else {
            "Request review from owner team(s) above"
        };
        out.push_str(&format!("ACTION: {}\n", action));

        for (severity, prefix) in [(Severity::Block, "BLOCK"), (Severity::Warn, "WARN")] {
            for change in self.changes().filter(|c| c.severity == severity) {
                out.push_str(&format!("{}: {} - {}\n", prefix, change.kind, change.message));
            }
        }

        out.push_str(&serde_json::to_string_pretty(self)?);
        out.push('\n');
        Ok(out)
    }
}
