//! Build step errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildStepError {
    #[error("step {step} has an empty command")]
    EmptyCommand { step: String },

    #[error("unknown build step: {0}")]
    UnknownStep(String),

    #[error("failed to run step {step}: {source}")]
    Spawn {
        step: String,
        #[source]
        source: std::io::Error,
    },

    #[error("step {step} timed out after {timeout_secs} seconds")]
    Timeout { step: String, timeout_secs: u64 },

    #[error("step {step} failed with exit code {exit_code}\n{stderr_tail}")]
    Failed {
        step: String,
        exit_code: i32,
        stderr_tail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_message_names_step_and_code() {
        let err = BuildStepError::Failed {
            step: "build".to_string(),
            exit_code: 2,
            stderr_tail: "tsc: error".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("step build failed with exit code 2"));
        assert!(text.ends_with("tsc: error"));
    }

    #[test]
    fn timeout_message() {
        let err = BuildStepError::Timeout {
            step: "test".to_string(),
            timeout_secs: 30,
        };
        assert_eq!(err.to_string(), "step test timed out after 30 seconds");
    }
}
