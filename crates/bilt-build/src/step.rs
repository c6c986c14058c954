//! Build step definitions and configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BuildStepError;

/// Steps run when none are configured.
pub const DEFAULT_STEPS: &str = "install,update,build,test";

/// Builtin npm build steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStep {
    /// npm install
    Install,

    /// npm update
    Update,

    /// npm run build --if-present
    Build,

    /// npm test
    Test,
}

impl BuiltinStep {
    /// Get the step name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStep::Install => "install",
            BuiltinStep::Update => "update",
            BuiltinStep::Build => "build",
            BuiltinStep::Test => "test",
        }
    }

    /// Get the step's command.
    pub fn command(&self) -> Vec<String> {
        let args: &[&str] = match self {
            BuiltinStep::Install => &["npm", "install"],
            BuiltinStep::Update => &["npm", "update"],
            BuiltinStep::Build => &["npm", "run", "build", "--if-present"],
            BuiltinStep::Test => &["npm", "test"],
        };
        args.iter().map(|a| a.to_string()).collect()
    }
}

impl FromStr for BuiltinStep {
    type Err = BuildStepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(BuiltinStep::Install),
            "update" => Ok(BuiltinStep::Update),
            "build" => Ok(BuiltinStep::Build),
            "test" => Ok(BuiltinStep::Test),
            other => Err(BuildStepError::UnknownStep(other.to_string())),
        }
    }
}

/// Configuration for a build step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepConfig {
    /// Human-readable step name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,

    /// Whether this step is enabled.
    pub enabled: bool,
}

impl StepConfig {
    /// Create a step configuration from a builtin step.
    pub fn from_builtin(step: BuiltinStep, timeout_secs: u64) -> Self {
        Self {
            name: step.name().to_string(),
            command: step.command(),
            timeout_secs,
            enabled: true,
        }
    }

    /// Create a custom step configuration.
    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            timeout_secs,
            enabled: true,
        }
    }

    /// Disable this step.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Parse a comma-separated step list.
///
/// Entries are builtin step names (`install`, `update`, `build`, `test`) or
/// custom steps written `name=command arg...`, split on whitespace.
/// Blank entries are skipped.
pub fn parse_steps(list: &str, timeout_secs: u64) -> Result<Vec<StepConfig>, BuildStepError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((name, command)) => {
                let name = name.trim();
                let command: Vec<String> =
                    command.split_whitespace().map(str::to_string).collect();
                if command.is_empty() {
                    return Err(BuildStepError::EmptyCommand {
                        step: name.to_string(),
                    });
                }
                Ok(StepConfig::custom(name, command, timeout_secs))
            }
            None => Ok(StepConfig::from_builtin(entry.parse()?, timeout_secs)),
        })
        .collect()
}
