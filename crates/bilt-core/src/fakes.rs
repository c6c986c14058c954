//! In-memory fakes for the cycle's seams (testing only)
//!
//! Provides `RecordingVcs` and `RecordingReporter` that satisfy the trait
//! contracts without touching a real repository or the console.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::{BiltError, Result};
use crate::domain::package::PackageInfo;
use crate::git::{CommitFiles, Vcs};
use crate::reporter::Reporter;

// ---------------------------------------------------------------------------
// RecordingVcs
// ---------------------------------------------------------------------------

/// A version-control call observed by [`RecordingVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Pull(PathBuf),
    Add(PathBuf),
    Commit(String),
    Push(PathBuf),
    CommitMessage(String),
    Status,
    Log,
}

/// Which operation a [`RecordingVcs`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsOp {
    Pull,
    Add,
    Commit,
    Push,
}

/// Scriptable [`Vcs`] that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingVcs {
    messages: HashMap<String, String>,
    uncommitted: Vec<String>,
    history: Vec<CommitFiles>,
    fail_on: Option<VcsOp>,
    calls: Mutex<Vec<VcsCall>>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit_message(mut self, commit: &str, message: &str) -> Self {
        self.messages
            .insert(commit.to_string(), message.to_string());
        self
    }

    pub fn with_uncommitted(mut self, paths: &[&str]) -> Self {
        self.uncommitted
            .extend(paths.iter().map(|p| p.to_string()));
        self
    }

    /// Append a commit to the history (call newest first).
    pub fn with_commit(mut self, commit: &str, message: &str, paths: &[&str]) -> Self {
        self.history.push(CommitFiles {
            commit: commit.to_string(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        });
        self.with_commit_message(commit, message)
    }

    pub fn failing_on(mut self, op: VcsOp) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Directories passed to `add_all`, in order.
    pub fn staged(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VcsCall::Add(dir) => Some(dir),
                _ => None,
            })
            .collect()
    }

    /// Whether any call mutated the repository beyond pulling.
    pub fn mutated(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, VcsCall::Add(_) | VcsCall::Commit(_) | VcsCall::Push(_)))
    }

    fn record(&self, call: VcsCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: VcsOp) -> Result<()> {
        if self.fail_on == Some(op) {
            return Err(BiltError::Git {
                command: format!("{op:?}").to_lowercase(),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Vcs for RecordingVcs {
    async fn pull_rebase_autostash(&self, root: &Path) -> Result<()> {
        self.record(VcsCall::Pull(root.to_path_buf()));
        self.check(VcsOp::Pull)
    }

    async fn add_all(&self, directory: &Path) -> Result<()> {
        self.record(VcsCall::Add(directory.to_path_buf()));
        self.check(VcsOp::Add)
    }

    async fn commit(&self, _root: &Path, message: &str) -> Result<()> {
        self.record(VcsCall::Commit(message.to_string()));
        self.check(VcsOp::Commit)
    }

    async fn push(&self, root: &Path) -> Result<()> {
        self.record(VcsCall::Push(root.to_path_buf()));
        self.check(VcsOp::Push)
    }

    async fn commit_message(&self, _root: &Path, commit: &str) -> Result<String> {
        self.record(VcsCall::CommitMessage(commit.to_string()));
        self.messages
            .get(commit)
            .cloned()
            .ok_or_else(|| BiltError::Git {
                command: "show".to_string(),
                stderr: format!("bad object {commit}"),
            })
    }

    async fn uncommitted_files(&self, _root: &Path) -> Result<Vec<String>> {
        self.record(VcsCall::Status);
        Ok(self.uncommitted.clone())
    }

    async fn commit_history(&self, _root: &Path) -> Result<Vec<CommitFiles>> {
        self.record(VcsCall::Log);
        Ok(self.history.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// A line of output observed by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Header(String),
    Operation(String),
    Footer(String),
    PackageSucceeded { directory: String, message: String },
    PackageFailed { directory: String, message: String, error: String },
    Plain(String),
}

/// [`Reporter`] that keeps everything it is told.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn footers(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Footer(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn failed_packages(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::PackageFailed { directory, .. } => Some(directory),
                _ => None,
            })
            .collect()
    }

    pub fn plain(&self) -> Vec<String> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Plain(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, report: Report) {
        self.reports.lock().unwrap().push(report);
    }
}

impl Reporter for RecordingReporter {
    fn global_header(&self, text: &str) {
        self.push(Report::Header(text.to_string()));
    }

    fn global_operation(&self, text: &str) {
        self.push(Report::Operation(text.to_string()));
    }

    fn global_footer(&self, text: &str) {
        self.push(Report::Footer(text.to_string()));
    }

    fn package_footer(&self, text: &str, package: &PackageInfo) {
        self.push(Report::PackageSucceeded {
            directory: package.directory().to_string(),
            message: text.to_string(),
        });
    }

    fn package_error_footer(&self, text: &str, package: &PackageInfo, error: &str) {
        self.push(Report::PackageFailed {
            directory: package.directory().to_string(),
            message: text.to_string(),
            error: error.to_string(),
        });
    }

    fn plain(&self, text: &str) {
        self.push(Report::Plain(text.to_string()));
    }
}
