//! bilt build - the real per-package build action
//!
//! Runs a configurable list of build steps in each package directory:
//! - builtin npm steps (install, update, build, test)
//! - custom commands
//!
//! [`PackageBuilder`] plugs into the bilt-core executor as a `BuildAction`.

pub mod builder;
pub mod error;
pub mod runner;
pub mod step;

// Re-export key types
pub use builder::PackageBuilder;
pub use error::BuildStepError;
pub use runner::{StepResult, StepRunner};
pub use step::{parse_steps, BuiltinStep, StepConfig, DEFAULT_STEPS};
