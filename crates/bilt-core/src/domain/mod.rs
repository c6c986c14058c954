//! Domain models for bilt.
//!
//! Canonical definitions for the core entities:
//! - `Package` / `PackageInfo`: a directory-scoped unit of source and its dependency edges
//! - `PackageChange`: the latest commit (or uncommitted work) touching a package
//! - `BuildOutcome`: the result of building one package

pub mod error;
pub mod outcome;
pub mod package;

// Re-export main types and errors
pub use error::{BiltError, Result};
pub use outcome::{BuildError, BuildOutcome, BuildStatus};
pub use package::{Commitish, Package, PackageChange, PackageInfo, PackageInfos};
