//! The per-package build action.

use std::path::PathBuf;

use async_trait::async_trait;
use bilt_core::{BuildAction, BuildError, PackageInfo};
use tracing::{debug, info, warn};

use crate::error::BuildStepError;
use crate::runner::StepRunner;
use crate::step::StepConfig;

/// Lines of stderr kept in the error of a failed step.
const STDERR_TAIL_LINES: usize = 20;

/// Builds a package by running the enabled steps in its directory.
///
/// The first failing step fails the package; later steps are not run.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    root: PathBuf,
    steps: Vec<StepConfig>,
}

impl PackageBuilder {
    pub fn new(root: impl Into<PathBuf>, steps: Vec<StepConfig>) -> Self {
        Self {
            root: root.into(),
            steps,
        }
    }

    pub fn steps(&self) -> &[StepConfig] {
        &self.steps
    }

    /// Run every enabled step for `package`.
    pub async fn run_steps(&self, package: &PackageInfo) -> Result<(), BuildStepError> {
        let cwd = self.root.join(package.directory());
        for config in &self.steps {
            if !config.enabled {
                debug!(package = %package.directory(), step = %config.name, "skipping disabled step");
                continue;
            }

            info!(package = %package.directory(), step = %config.name, "executing step");
            let result = StepRunner::execute_step(config, &cwd).await?;
            if !result.passed() {
                warn!(
                    package = %package.directory(),
                    step = %config.name,
                    exit_code = result.exit_code,
                    "step failed"
                );
                return Err(BuildStepError::Failed {
                    step: config.name.clone(),
                    exit_code: result.exit_code,
                    stderr_tail: result.stderr_tail(STDERR_TAIL_LINES),
                });
            }
            debug!(
                package = %package.directory(),
                step = %config.name,
                duration_ms = result.duration_ms,
                "step passed"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl BuildAction for PackageBuilder {
    async fn build_package(&self, package: &PackageInfo) -> Result<(), BuildError> {
        self.run_steps(package)
            .await
            .map_err(|e| BuildError::ActionFailed(e.to_string()))
    }
}
