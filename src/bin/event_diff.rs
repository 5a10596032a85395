//! Event Schema Gate CLI
//!
//! Compares the schema directory at two revisions and gates on the result.
//!
//! Usage:
//!   event-diff --base=origin/main --head=HEAD [--dir=schemas]
//!   event-diff --base=./before --head=./after --local
//!
//! Exit codes: 0 no blocking change, 1 at least one blocking change,
//! 2 invalid invocation or no report could be produced.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use event_schema_gate::{DirectorySource, GateConfig, GitSource, RevisionSource, RunAggregator};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "event-diff")]
#[command(about = "Classify event schema changes between two revisions")]
struct Cli {
    /// Base revision (commit, branch or tag; a directory with --local)
    #[arg(long)]
    base: String,

    /// Head revision (commit, branch or tag; a directory with --local)
    #[arg(long)]
    head: String,

    /// Schema directory relative to the project root [default: schemas]
    #[arg(long)]
    dir: Option<String>,

    /// Repository path (or the root local revisions are resolved against)
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Treat --base and --head as directories instead of Git revisions
    #[arg(long)]
    local: bool,

    /// Additional configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Policy document [default: policy.json]
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Ownership document [default: owners.json]
    #[arg(long)]
    owners: Option<PathBuf>,
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

fn load_config(cli: &Cli) -> anyhow::Result<GateConfig> {
    let mut config = match GateConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_none() => {
            warn!(error = %e, "ignoring unreadable gate configuration");
            GateConfig::default()
        }
        Err(e) => return Err(e).context("loading configuration"),
    };

    if let Some(dir) = &cli.dir {
        config.dir = dir.clone();
    }
    if let Some(repo) = &cli.repo {
        config.repo = repo.clone();
    }
    if let Some(policy) = &cli.policy {
        config.policy_path = policy.clone();
    }
    if let Some(owners) = &cli.owners {
        config.owners_path = owners.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = load_config(&cli)?;
    let policy = config.policy();
    let ownership = config.ownership();

    let source: Box<dyn RevisionSource> = if cli.local {
        Box::new(DirectorySource::new(&config.repo))
    } else {
        Box::new(
            GitSource::open(&config.repo)
                .with_context(|| format!("opening repository at {}", config.repo.display()))?,
        )
    };

    let report = RunAggregator::new(source.as_ref(), &policy, &ownership)
        .run_changed(&cli.base, &cli.head, &config.dir)
        .context("listing changed schema files")?;

    print!("{}", report.render(&ownership)?);
    Ok(report.exit_code())
}
