//! Build orchestration: order the build set, run it and stage the results.
//!
//! The orchestrator consumes the executor's outcome stream one outcome at a
//! time. A failed package is reported and the build keeps going; a package
//! that built successfully has its directory staged with `git add` before
//! the next outcome is looked at (skipped on dry runs).

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{info, instrument};

use crate::domain::error::Result;
use crate::domain::package::PackageInfos;
use crate::executor::{execute_build, BuildAction};
use crate::git::Vcs;
use crate::graph::calculate_build_order;
use crate::obs;
use crate::reporter::Reporter;

/// What happened to the build set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// At least one package built successfully.
    pub package_was_built: bool,
    /// Directories that built, in the order their outcomes arrived.
    pub succeeded: Vec<String>,
    /// Directories that failed (including those with a failed dependency).
    pub failed: Vec<String>,
}

impl BuildSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Runs the build of one build set.
pub struct BuildOrchestrator<'a> {
    vcs: &'a dyn Vcs,
    reporter: &'a dyn Reporter,
    root: &'a Path,
    dry_run: bool,
    jobs: usize,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(vcs: &'a dyn Vcs, reporter: &'a dyn Reporter, root: &'a Path) -> Self {
        Self {
            vcs,
            reporter,
            root,
            dry_run: false,
            jobs: 1,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Build `infos` with `action`.
    ///
    /// Fails only on errors the cycle cannot continue from: a dependency
    /// cycle in the build set or a failing `git add`. Package failures are
    /// part of the returned summary.
    #[instrument(skip_all, fields(packages = infos.len(), dry_run = self.dry_run))]
    pub async fn build_packages(
        &self,
        infos: &PackageInfos,
        action: Arc<dyn BuildAction>,
    ) -> Result<BuildSummary> {
        let order = calculate_build_order(infos)?;
        let mut outcomes = execute_build(infos.clone(), order, action, self.jobs);
        let mut summary = BuildSummary::default();

        while let Some(outcome) = outcomes.next().await {
            let directory = outcome.package.directory().to_string();
            let Some(info) = infos.get(&directory) else {
                continue;
            };

            if !outcome.is_success() {
                let error = outcome
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown error".to_string());
                self.reporter
                    .package_error_footer("build package failed", info, &error);
                obs::emit_package_failed(&directory, &error);
                summary.failed.push(directory);
                continue;
            }

            summary.package_was_built = true;
            obs::emit_package_built(&directory);
            if !self.dry_run {
                self.reporter.package_footer("build package succeeded", info);
                self.vcs.add_all(&self.root.join(&directory)).await?;
            }
            summary.succeeded.push(directory);
        }

        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "build finished"
        );
        Ok(summary)
    }
}
