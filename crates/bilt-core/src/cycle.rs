//! The git build cycle: pull, select, build, commit and push.
//!
//! One call to [`GitCycleManager::run`] is one invocation of the tool. The
//! working copy is pulled (rebase + autostash) before anything is selected,
//! successful packages are staged while the build runs, and a single commit
//! carrying the artifacts marker is pushed at the end. Any version-control
//! failure aborts the cycle; package failures do not.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, Instrument};

use crate::domain::error::Result;
use crate::domain::package::Package;
use crate::executor::{BuildAction, DryRunAction};
use crate::git::Vcs;
use crate::loop_guard::artifact_commit_message;
use crate::obs::{self, CycleSpan};
use crate::orchestrator::BuildOrchestrator;
use crate::reporter::{format_directories, Reporter};
use crate::selection::BuildSetSelector;

/// Default commit message of the build commit.
pub const DEFAULT_MESSAGE: &str = "build";

/// Options of one build cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Repository root.
    pub root: PathBuf,
    /// Explicit package selection; empty means every package.
    pub packages: Vec<Package>,
    /// Packages to build up to.
    pub upto: Vec<Package>,
    /// Build exactly `packages`, skipping change detection.
    pub force: bool,
    /// Print the build order instead of building; no git mutation.
    pub dry_run: bool,
    /// Commit message; the artifacts marker is appended.
    pub message: String,
    /// Maximum concurrent package builds.
    pub jobs: usize,
}

impl BuildOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            packages: Vec::new(),
            upto: Vec::new(),
            force: false,
            dry_run: false,
            message: DEFAULT_MESSAGE.to_string(),
            jobs: 1,
        }
    }

    pub fn packages(mut self, packages: impl IntoIterator<Item = Package>) -> Self {
        self.packages = packages.into_iter().collect();
        self
    }

    pub fn upto(mut self, upto: impl IntoIterator<Item = Package>) -> Self {
        self.upto = upto.into_iter().collect();
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::new(".")
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The build set was empty; nothing was built, committed or pushed.
    NothingToBuild,
    /// Dry run: the directories in the order they would be built.
    DryRun { build_order: Vec<String> },
    /// At least one package built; the build commit was pushed.
    Committed {
        built: Vec<String>,
        failed: Vec<String>,
    },
    /// Every package of a non-empty build set failed; nothing was committed.
    AllFailed { failed: Vec<String> },
}

impl CycleOutcome {
    pub fn has_failures(&self) -> bool {
        match self {
            Self::Committed { failed, .. } => !failed.is_empty(),
            Self::AllFailed { .. } => true,
            Self::NothingToBuild | Self::DryRun { .. } => false,
        }
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NothingToBuild => "nothing_to_build",
            Self::DryRun { .. } => "dry_run",
            Self::Committed { .. } => "committed",
            Self::AllFailed { .. } => "all_failed",
        }
    }
}

/// Runs whole build cycles against one repository.
pub struct GitCycleManager<'a> {
    vcs: &'a dyn Vcs,
    reporter: &'a dyn Reporter,
}

impl<'a> GitCycleManager<'a> {
    pub fn new(vcs: &'a dyn Vcs, reporter: &'a dyn Reporter) -> Self {
        Self { vcs, reporter }
    }

    /// Run one cycle.
    ///
    /// `action` builds each package; it is replaced by a [`DryRunAction`]
    /// when `options.dry_run` is set.
    pub async fn run(
        &self,
        options: &BuildOptions,
        action: Arc<dyn BuildAction>,
    ) -> Result<CycleOutcome> {
        let span = CycleSpan::new(&options.root);
        debug!(cycle_id = %span.cycle_id(), "starting build cycle");
        let started = Instant::now();

        async move {
            let result = self.run_cycle(options, action).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(outcome) => obs::emit_cycle_finished(outcome.label(), duration_ms),
                Err(e) => error!(error = %e, duration_ms, "build cycle aborted"),
            }
            result
        }
        .instrument(span.span())
        .await
    }

    async fn run_cycle(
        &self,
        options: &BuildOptions,
        action: Arc<dyn BuildAction>,
    ) -> Result<CycleOutcome> {
        let root = options.root.as_path();
        obs::emit_cycle_started(root, options.force, options.dry_run);

        if !options.dry_run {
            self.reporter.global_operation("pulling commits from remote");
            self.vcs.pull_rebase_autostash(root).await?;
        }

        let selection = BuildSetSelector::new(self.vcs, root)
            .select(&options.packages, &options.upto, options.force)
            .await?;
        obs::emit_cycle_selected(selection.package_infos.len(), selection.changed.len());

        // A dry run always ends with its build order line, even an empty one.
        if selection.is_empty() && !options.dry_run {
            self.reporter.global_footer("nothing to build");
            return Ok(CycleOutcome::NothingToBuild);
        }

        self.reporter.global_header(&format!(
            "building {}",
            format_directories(selection.directories())
        ));

        let orchestrator = BuildOrchestrator::new(self.vcs, self.reporter, root)
            .dry_run(options.dry_run)
            .jobs(options.jobs);

        if options.dry_run {
            let dry_run = DryRunAction::new();
            orchestrator
                .build_packages(&selection.package_infos, Arc::new(dry_run.clone()))
                .await?;
            let build_order = dry_run.build_order();
            self.reporter
                .plain(&format_directories(build_order.iter().map(String::as_str)));
            return Ok(CycleOutcome::DryRun { build_order });
        }

        let summary = orchestrator
            .build_packages(&selection.package_infos, action)
            .await?;

        if !summary.package_was_built {
            self.reporter.global_footer("all packages failed to build");
            return Ok(CycleOutcome::AllFailed {
                failed: summary.failed,
            });
        }

        self.reporter.global_operation("committing packages");
        self.vcs
            .commit(root, &artifact_commit_message(&options.message))
            .await?;
        self.reporter.global_operation("pushing commits to remote");
        self.vcs.push(root).await?;
        obs::emit_cycle_committed(summary.succeeded.len());

        if summary.has_failures() {
            self.reporter.global_footer(&format!(
                "built {} package(s), {} failed",
                summary.succeeded.len(),
                summary.failed.len()
            ));
        } else {
            self.reporter
                .global_footer(&format!("built {} package(s)", summary.succeeded.len()));
        }

        Ok(CycleOutcome::Committed {
            built: summary.succeeded,
            failed: summary.failed,
        })
    }
}

/// Run one build cycle with `vcs` and `reporter`.
pub async fn run_build_cycle(
    vcs: &dyn Vcs,
    reporter: &dyn Reporter,
    options: &BuildOptions,
    action: Arc<dyn BuildAction>,
) -> Result<CycleOutcome> {
    GitCycleManager::new(vcs, reporter).run(options, action).await
}
