//! Per-package build outcomes.

use serde::{Deserialize, Serialize};

use crate::domain::package::Package;

/// Whether a package built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Failure,
}

/// Why a package failed to build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildError {
    /// The build action itself reported a failure.
    #[error("{0}")]
    ActionFailed(String),

    /// Not built because a dependency failed to build.
    #[error("dependency {dependency} failed to build")]
    DependencyFailed { dependency: String },

    /// The build action panicked or its task was lost.
    #[error("build task aborted: {0}")]
    Aborted(String),
}

/// The outcome of building one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub package: Package,
    pub status: BuildStatus,
    pub error: Option<BuildError>,
}

impl BuildOutcome {
    pub fn success(package: Package) -> Self {
        Self {
            package,
            status: BuildStatus::Success,
            error: None,
        }
    }

    pub fn failure(package: Package, error: BuildError) -> Self {
        Self {
            package,
            status: BuildStatus::Failure,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_constructors() {
        let ok = BuildOutcome::success(Package::new("a"));
        assert!(ok.is_success());
        assert!(ok.error.is_none());

        let failed = BuildOutcome::failure(
            Package::new("b"),
            BuildError::DependencyFailed {
                dependency: "a".to_string(),
            },
        );
        assert!(!failed.is_success());
        assert_eq!(
            failed.error.map(|e| e.to_string()),
            Some("dependency a failed to build".to_string())
        );
    }
}
