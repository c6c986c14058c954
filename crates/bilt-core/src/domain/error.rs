//! Error taxonomy for bilt.
//!
//! Per-package build failures are not errors at this level; they travel as
//! [`crate::domain::BuildOutcome`]s. Everything here aborts the cycle.

use std::path::PathBuf;

/// Bilt errors.
#[derive(Debug, thiserror::Error)]
pub enum BiltError {
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read package.json in {path}: {reason}")]
    PackageJson { path: PathBuf, reason: String },

    #[error("invalid package {package}: {reason}")]
    InvalidPackage { package: String, reason: String },

    #[error("dependency cycle detected involving packages: {packages:?}")]
    DependencyCycle { packages: Vec<String> },

    #[error("package not found: {package}")]
    PackageNotFound { package: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bilt operations.
pub type Result<T> = std::result::Result<T, BiltError>;
