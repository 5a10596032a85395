//! Event Schema Gate
//!
//! Compares JSON event schemas at two revisions and classifies every
//! difference by compatibility risk, so breaking changes to a data contract
//! can be blocked before release.
//!
//! ## Pipeline
//!
//! ```text
//! changed files ──► RunAggregator ──► file_at(base) / file_at(head)
//!                         │
//!                         ├─ added / removed / invalid ──► single change
//!                         └─ both parse ──► flatten ×2 ──► SchemaDiffer ──► PolicyResolver
//!                         ▼
//!                     RunReport ──► console summary + JSON
//! ```
//!
//! ## Severities
//!
//! Every change resolves to `pass`, `warn` or `block`. The shared policy sets
//! the baseline and each owning team may only make a rule stricter. Any
//! `block` fails the run.

pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod ownership;
pub mod policy;
pub mod report;
pub mod run;
pub mod schema;
pub mod source;

pub use compatibility::{
    enum_diff, ChangeKind, ChangeRecord, Decision, EnumDiff, SchemaDiff, SchemaDiffer, Summary,
};
pub use config::GateConfig;
pub use error::{GateError, Result};
pub use ownership::{event_name, OwnershipMap};
pub use policy::{PolicyConfig, PolicyResolver, RuleKey, Severity};
pub use report::{FileReport, RunReport};
pub use run::{FileOutcome, RunAggregator, Side};
pub use schema::{flatten, FieldDescriptor, SchemaSnapshot};
pub use source::{DirectorySource, GitSource, MemorySource, RevisionSource};
