//! Git integration: the version-control operations of a build cycle.
//!
//! Everything the cycle does to version control goes through the [`Vcs`]
//! trait so the orchestration logic can be exercised against a fake. The
//! production implementation, [`GitCli`], shells out to `git`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::domain::error::{BiltError, Result};

/// The files touched by one commit, as reported by `git log --name-only`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFiles {
    pub commit: String,
    pub paths: Vec<String>,
}

/// Version-control operations used by the build cycle.
///
/// Every failure is fatal to the cycle; implementations must not retry.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// `git pull --rebase --autostash` in the repository root.
    async fn pull_rebase_autostash(&self, root: &Path) -> Result<()>;

    /// `git add .` scoped to a package directory.
    async fn add_all(&self, directory: &Path) -> Result<()>;

    /// Commit the index with the exact `message`.
    async fn commit(&self, root: &Path, message: &str) -> Result<()>;

    /// `git push` from the repository root.
    async fn push(&self, root: &Path) -> Result<()>;

    /// Full message (subject and body) of `commit`.
    async fn commit_message(&self, root: &Path, commit: &str) -> Result<String>;

    /// Root-relative paths with uncommitted modifications, including untracked files.
    async fn uncommitted_files(&self, root: &Path) -> Result<Vec<String>>;

    /// Commit history, newest first, with the paths each commit touched.
    async fn commit_history(&self, root: &Path) -> Result<Vec<CommitFiles>>;
}

/// [`Vcs`] implementation that runs the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git in `cwd` and return its stdout.
    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<String> {
        debug!(cwd = %cwd.display(), ?args, "running git");
        let output = Command::new(&self.program)
            .args(["-c", "core.quotepath=false"])
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| BiltError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(BiltError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Vcs for GitCli {
    #[instrument(skip(self))]
    async fn pull_rebase_autostash(&self, root: &Path) -> Result<()> {
        self.run(root, &["pull", "--rebase", "--autostash"]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_all(&self, directory: &Path) -> Result<()> {
        self.run(directory, &["add", "."]).await?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn commit(&self, root: &Path, message: &str) -> Result<()> {
        self.run(root, &["commit", "-m", message]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn push(&self, root: &Path) -> Result<()> {
        self.run(root, &["push"]).await?;
        Ok(())
    }

    async fn commit_message(&self, root: &Path, commit: &str) -> Result<String> {
        self.run(root, &["show", "--format=%B", "-s", commit]).await
    }

    async fn uncommitted_files(&self, root: &Path) -> Result<Vec<String>> {
        let out = self
            .run(root, &["status", "--porcelain=v1", "-uall"])
            .await?;
        Ok(parse_status_porcelain(&out))
    }

    async fn commit_history(&self, root: &Path) -> Result<Vec<CommitFiles>> {
        match self
            .run(root, &["log", "--format=format:%x00%H", "--name-only"])
            .await
        {
            Ok(out) => Ok(parse_log_name_only(&out)),
            // A freshly initialised repository has no history yet.
            Err(BiltError::Git { stderr, .. }) if stderr.contains("does not have any commits") => {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// Parse `git status --porcelain=v1` output into root-relative paths.
///
/// Renames and copies yield the destination path.
pub fn parse_status_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let (status, entry) = line.split_at(3);
            let path = if status.contains(|c| c == 'R' || c == 'C') {
                rename_destination(entry)
            } else {
                entry
            };
            unquote(path)
        })
        .collect()
}

/// Destination of a `source -> destination` status entry.
fn rename_destination(entry: &str) -> &str {
    // A quoted destination cannot contain an unescaped `"`.
    if entry.ends_with('"') {
        if let Some(pos) = entry.rfind(" -> \"") {
            return &entry[pos + 4..];
        }
    }
    entry.rsplit(" -> ").next().unwrap_or(entry)
}

/// Parse `git log --format=format:%x00%H --name-only` output.
///
/// Commit lines start with a NUL byte, which cannot appear in a path.
pub fn parse_log_name_only(output: &str) -> Vec<CommitFiles> {
    let mut commits: Vec<CommitFiles> = Vec::new();
    for line in output.lines() {
        if let Some(sha) = line.strip_prefix('\0') {
            commits.push(CommitFiles {
                commit: sha.trim().to_string(),
                paths: Vec::new(),
            });
        } else if !line.trim().is_empty() {
            if let Some(current) = commits.last_mut() {
                current.paths.push(unquote(line));
            }
        }
    }
    commits
}

/// Strip git's C-style quoting from a path, if present.
///
/// Bytes outside printable ASCII arrive as three-digit octal escapes;
/// multi-byte UTF-8 characters are reassembled from them.
fn unquote(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };
    let bytes = inner.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let escaped = bytes[i + 1];
        let octal = bytes
            .get(i + 1..i + 4)
            .filter(|digits| digits.iter().all(|d| (b'0'..=b'7').contains(d)));
        if let Some(digits) = octal {
            let value = digits
                .iter()
                .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            out.push(value as u8);
            i += 4;
            continue;
        }
        out.push(match escaped {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            other => other,
        });
        i += 2;
    }
    String::from_utf8_lossy(&out).into_owned()
}
