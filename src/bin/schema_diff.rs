//! Schema Diff CLI
//!
//! Diffs two schema files on disk with the gate's rules, without any
//! version control. Handy for checking a change before it is committed.
//!
//! Usage:
//!   schema-diff old/order.json new/order.json --owner payments

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use event_schema_gate::{flatten, PolicyConfig, PolicyResolver, SchemaDiffer, Severity};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-diff")]
#[command(about = "Classify the changes between two schema files")]
struct Cli {
    /// Previous version of the schema
    old: PathBuf,

    /// New version of the schema
    new: PathBuf,

    /// Owning team (repeatable); owner overrides in the policy apply
    #[arg(long = "owner")]
    owners: Vec<String>,

    /// Policy document; built-in defaults when omitted
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Print the diff as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn read_schema(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let old = read_schema(&cli.old)?;
    let new = read_schema(&cli.new)?;

    let config = match &cli.policy {
        Some(path) => PolicyConfig::load(path)
            .with_context(|| format!("loading policy {}", path.display()))?,
        None => PolicyConfig::default(),
    };
    let policy = PolicyResolver::new(config);

    let diff = SchemaDiffer::new(&policy).diff(&flatten(&old), &flatten(&new), &cli.owners);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
    } else {
        println!(
            "SchemaDiff: {} | blocks={} warns={} passes={}",
            diff.summary.label(),
            diff.summary.blocks,
            diff.summary.warns,
            diff.summary.passes
        );
        for change in &diff.changes {
            let prefix = match change.severity {
                Severity::Block => "BLOCK",
                Severity::Warn => "WARN",
                Severity::Pass => "PASS",
            };
            println!("{}: {} - {}", prefix, change.kind, change.message);
        }
    }

    Ok(if diff.summary.blocks > 0 { 1 } else { 0 })
}
