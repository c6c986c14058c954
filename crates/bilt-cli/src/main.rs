//! bilt - incremental builds for multi-package repositories
//!
//! Builds the packages that changed since the last build commit (and
//! everything depending on them), then commits and pushes the results.
//!
//! ## Exit codes
//!
//! - `0`: the cycle completed, including "nothing to build" and dry runs
//! - `1`: the cycle was aborted (git failure, invalid package, dependency cycle)
//! - `2`: the cycle completed but at least one package failed to build

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use bilt_build::{parse_steps, PackageBuilder, DEFAULT_STEPS};
use bilt_core::{
    run_build_cycle, BuildOptions, ConsoleReporter, CycleOutcome, GitCli, Package,
    DEFAULT_MESSAGE,
};

#[derive(Parser, Debug)]
#[command(name = "bilt")]
#[command(version = bilt_core::VERSION)]
#[command(about = "Incremental build orchestrator for multi-package repositories", long_about = None)]
struct Cli {
    /// Packages to build, as directories relative to the root (default: all)
    packages: Vec<String>,

    /// Repository root
    #[arg(short, long, env = "BILT_ROOT", default_value = ".")]
    root: PathBuf,

    /// Build up to these packages (repeatable, comma separated)
    #[arg(short, long, value_delimiter = ',')]
    upto: Vec<String>,

    /// Build exactly the given packages, skipping change detection
    #[arg(short, long)]
    force: bool,

    /// Print the build order without building or touching git
    #[arg(long)]
    dry_run: bool,

    /// Commit message for the build commit
    #[arg(short, long, env = "BILT_MESSAGE", default_value = DEFAULT_MESSAGE)]
    message: String,

    /// Maximum number of packages built at once
    #[arg(short, long, env = "BILT_JOBS", default_value_t = 1)]
    jobs: usize,

    /// Build steps: install, update, build, test or name=command
    #[arg(long, env = "BILT_STEPS", default_value = DEFAULT_STEPS)]
    steps: String,

    /// Per-step timeout in seconds (0 = none)
    #[arg(long, default_value_t = 0)]
    step_timeout: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn build_options(&self) -> BuildOptions {
        BuildOptions::new(&self.root)
            .packages(self.packages.iter().map(Package::new))
            .upto(
                self.upto
                    .iter()
                    .filter(|p| !p.trim().is_empty())
                    .map(Package::new),
            )
            .force(self.force)
            .dry_run(self.dry_run)
            .message(self.message.clone())
            .jobs(self.jobs.max(1))
    }
}

/// Process exit code of a completed cycle.
fn exit_code(outcome: &CycleOutcome) -> u8 {
    if outcome.has_failures() {
        2
    } else {
        0
    }
}

async fn run(cli: &Cli) -> Result<CycleOutcome> {
    let steps = parse_steps(&cli.steps, cli.step_timeout).context("Invalid --steps")?;
    let options = cli.build_options();

    let vcs = GitCli::new();
    let reporter = ConsoleReporter::new();
    let builder = PackageBuilder::new(&options.root, steps);

    let outcome = run_build_cycle(&vcs, &reporter, &options, Arc::new(builder))
        .await
        .with_context(|| format!("Build cycle failed in {}", options.root.display()))?;
    info!(outcome = outcome.label(), "bilt finished");
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    bilt_core::init_tracing(cli.json, level);

    match run(&cli).await {
        Ok(outcome) => ExitCode::from(exit_code(&outcome)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
