//! Build step execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::error::BuildStepError;
use crate::step::StepConfig;

/// Result of a step execution.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Step name.
    pub step_name: String,

    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl StepResult {
    /// Whether this step passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// The last `lines` lines of stderr.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

/// Runs build steps as subprocesses.
pub struct StepRunner;

impl StepRunner {
    /// Execute a single step in `cwd` and return the result.
    ///
    /// A step that runs and exits non-zero is a result, not an error; errors
    /// are reserved for steps that could not run to completion.
    pub async fn execute_step(config: &StepConfig, cwd: &Path) -> Result<StepResult, BuildStepError> {
        let start = Instant::now();

        let Some((exe, args)) = config.command.split_first() else {
            return Err(BuildStepError::EmptyCommand {
                step: config.name.clone(),
            });
        };

        debug!(step = %config.name, cwd = %cwd.display(), "running step");
        let child = Command::new(exe)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildStepError::Spawn {
                step: config.name.clone(),
                source,
            })?;

        let waited = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| BuildStepError::Timeout {
                step: config.name.clone(),
                timeout_secs: config.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        };
        let output = waited.map_err(|source| BuildStepError::Spawn {
            step: config.name.clone(),
            source,
        })?;

        Ok(StepResult {
            step_name: config.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stderr: &str) -> StepResult {
        StepResult {
            step_name: "build".to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration_ms: 100,
            success: exit_code == 0,
        }
    }

    #[test]
    fn test_step_result_passed() {
        assert!(result(0, "").passed());
        assert!(!result(1, "error").passed());
    }

    #[test]
    fn test_stderr_tail() {
        let r = result(1, "one\ntwo\nthree\n");
        assert_eq!(r.stderr_tail(2), "two\nthree");
        assert_eq!(r.stderr_tail(10), "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let config = StepConfig::custom("echo", vec!["echo".to_string(), "hello".to_string()], 60);

        let result = StepRunner::execute_step(&config, Path::new("."))
            .await
            .expect("execute failed");
        assert!(result.passed());
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let config = StepConfig::custom("false", vec!["false".to_string()], 60);

        let result = StepRunner::execute_step(&config, Path::new("."))
            .await
            .expect("execute failed");
        assert!(!result.passed());
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let config = StepConfig::custom("nothing", Vec::new(), 0);
        let err = StepRunner::execute_step(&config, Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildStepError::EmptyCommand { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let config = StepConfig::custom("ghost", vec!["bilt-no-such-program".to_string()], 0);
        let err = StepRunner::execute_step(&config, Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildStepError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let config = StepConfig::custom("sleep", vec!["sleep".to_string(), "5".to_string()], 1);
        let err = StepRunner::execute_step(&config, Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildStepError::Timeout { timeout_secs: 1, .. }));
    }
}
