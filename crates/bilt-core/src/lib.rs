//! bilt core library
//!
//! Incremental builds for multi-package repositories: find the packages
//! that changed since the last build commit, expand them to everything that
//! depends on them, build them in dependency order and commit the results
//! with a marker that keeps the next cycle from rebuilding its own output.

pub mod changes;
pub mod cycle;
pub mod discovery;
pub mod domain;
pub mod executor;
pub mod fakes;
pub mod git;
pub mod graph;
pub mod loop_guard;
pub mod obs;
pub mod orchestrator;
pub mod reporter;
pub mod selection;
pub mod telemetry;

pub use changes::{find_changed_files, find_latest_package_changes, ChangedFile};
pub use cycle::{run_build_cycle, BuildOptions, CycleOutcome, GitCycleManager, DEFAULT_MESSAGE};
pub use discovery::{find_packages, load_package_infos};
pub use domain::{
    BiltError, BuildError, BuildOutcome, BuildStatus, Commitish, Package, PackageChange,
    PackageInfo, PackageInfos, Result,
};
pub use executor::{execute_build, BuildAction, DryRunAction, OutcomeStream};
pub use git::{CommitFiles, GitCli, Vcs};
pub use graph::{
    calculate_build_order, calculate_packages_to_build, restrict_package_infos, PackageGraph,
};
pub use loop_guard::{artifact_commit_message, is_artifact_commit, ArtifactLoopGuard, ARTIFACTS_MARKER};
pub use orchestrator::{BuildOrchestrator, BuildSummary};
pub use reporter::{format_directories, ConsoleReporter, Reporter};
pub use selection::{merge_packages, BuildSelection, BuildSetSelector};
pub use telemetry::init_tracing;

/// Crate version, shown by `bilt --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
