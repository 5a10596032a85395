//! Run aggregation
//!
//! Drives one gate run: fetches every changed schema file at both revisions,
//! classifies the pair, diffs it when both sides are usable, and folds the
//! per-file reports into a [`RunReport`].

use serde_json::Value;
use tracing::{debug, info};

use crate::compatibility::{ChangeKind, ChangeRecord, SchemaDiff, SchemaDiffer, Summary};
use crate::error::Result;
use crate::ownership::OwnershipMap;
use crate::policy::{PolicyResolver, RuleKey};
use crate::report::{FileReport, RunReport};
use crate::schema::flatten;
use crate::source::RevisionSource;

/// Which revision of a file an outcome refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Base,
    Head,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Base => "base",
            Side::Head => "head",
        }
    }
}

/// How a changed file looks across the two revisions
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Present at head only
    Added,
    /// Present at base only
    Removed,
    /// Could not be read or parsed on `side`
    Invalid { side: Side, error: String },
    /// Present and parseable on both sides
    Compared { old: Value, new: Value },
    /// Present on neither side
    Missing,
}

/// Reduces all changed files of a run into one report
pub struct RunAggregator<'a, S: RevisionSource + ?Sized> {
    source: &'a S,
    policy: &'a PolicyResolver,
    owners: &'a OwnershipMap,
}

impl<'a, S: RevisionSource + ?Sized> RunAggregator<'a, S> {
    pub fn new(source: &'a S, policy: &'a PolicyResolver, owners: &'a OwnershipMap) -> Self {
        Self {
            source,
            policy,
            owners,
        }
    }

    /// List the changed schema files under `dir` and report on them
    pub fn run_changed(&self, base: &str, head: &str, dir: &str) -> Result<RunReport> {
        let files = self.source.changed_files(base, head, dir)?;
        info!(base, head, dir, files = files.len(), "schema files changed");
        Ok(self.run(base, head, dir, &files))
    }

    /// Report on an explicit list of changed files, in the given order
    pub fn run(&self, base: &str, head: &str, dir: &str, files: &[String]) -> RunReport {
        let reports: Vec<FileReport> = files
            .iter()
            .map(|file| self.report_file(base, head, file))
            .collect();

        let summary = reports
            .iter()
            .fold(Summary::default(), |total, report| total.absorb(&report.summary));

        RunReport {
            base: base.to_string(),
            head: head.to_string(),
            dir: dir.to_string(),
            summary,
            reports,
        }
    }

    /// Fetch and classify one file
    pub fn outcome(&self, base: &str, head: &str, file: &str) -> FileOutcome {
        let old = match self.source.file_at(base, file) {
            Ok(content) => content,
            Err(e) => {
                return FileOutcome::Invalid {
                    side: Side::Base,
                    error: e.to_string(),
                }
            }
        };
        let new = match self.source.file_at(head, file) {
            Ok(content) => content,
            Err(e) => {
                return FileOutcome::Invalid {
                    side: Side::Head,
                    error: e.to_string(),
                }
            }
        };

        match (old, new) {
            (None, Some(_)) => FileOutcome::Added,
            (Some(_), None) => FileOutcome::Removed,
            (None, None) => FileOutcome::Missing,
            (Some(old), Some(new)) => {
                let old = match serde_json::from_str(&old) {
                    Ok(value) => value,
                    Err(e) => {
                        return FileOutcome::Invalid {
                            side: Side::Base,
                            error: e.to_string(),
                        }
                    }
                };
                let new = match serde_json::from_str(&new) {
                    Ok(value) => value,
                    Err(e) => {
                        return FileOutcome::Invalid {
                            side: Side::Head,
                            error: e.to_string(),
                        }
                    }
                };
                FileOutcome::Compared { old, new }
            }
        }
    }

    fn report_file(&self, base: &str, head: &str, file: &str) -> FileReport {
        let owners = self.owners.owners_for_file(file);

        let diff = match self.outcome(base, head, file) {
            FileOutcome::Added => SchemaDiff::new(vec![self.file_change(
                ChangeKind::FileAdded,
                RuleKey::FileAdded,
                file,
                owners,
                format!("Schema file added: {}", file),
            )]),
            FileOutcome::Removed => SchemaDiff::new(vec![self.file_change(
                ChangeKind::FileRemoved,
                RuleKey::FileRemoved,
                file,
                owners,
                format!("Schema file removed: {}", file),
            )]),
            FileOutcome::Invalid { side, error } => {
                let revision = match side {
                    Side::Base => base,
                    Side::Head => head,
                };
                SchemaDiff::new(vec![self.file_change(
                    ChangeKind::InvalidJson,
                    RuleKey::InvalidJson,
                    file,
                    owners,
                    format!(
                        "Invalid JSON at {} ({}) for {}: {}",
                        side.as_str(),
                        revision,
                        file,
                        error
                    ),
                )])
            }
            FileOutcome::Compared { old, new } => {
                SchemaDiffer::new(self.policy).diff(&flatten(&old), &flatten(&new), owners)
            }
            FileOutcome::Missing => {
                debug!(file, "file absent at both revisions");
                SchemaDiff::new(Vec::new())
            }
        };

        debug!(
            file,
            blocks = diff.summary.blocks,
            warns = diff.summary.warns,
            passes = diff.summary.passes,
            "file diffed"
        );

        FileReport {
            file: file.to_string(),
            summary: diff.summary,
            changes: diff.changes,
        }
    }

    fn file_change(
        &self,
        kind: ChangeKind,
        rule: RuleKey,
        file: &str,
        owners: &[String],
        message: String,
    ) -> ChangeRecord {
        ChangeRecord {
            kind,
            path: file.to_string(),
            severity: self.policy.severity_for(rule, owners),
            message,
        }
    }
}
