//! Artifact-loop guard.
//!
//! Every commit bilt makes carries [`ARTIFACTS_MARKER`] in its body. When the
//! latest change to a package is such a commit, the package has not changed
//! since it was last built, so the change must not trigger another build.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::domain::error::Result;
use crate::domain::package::{Commitish, PackageChange};
use crate::git::Vcs;

/// Token embedded in the body of every automated build commit.
pub const ARTIFACTS_MARKER: &str = "[bilt-artifacts]";

/// Whether a full commit message identifies an automated build commit.
///
/// All marker checks go through here.
pub fn is_artifact_commit(message: &str) -> bool {
    message.contains(ARTIFACTS_MARKER)
}

/// The message bilt commits with: the caller's message plus the marker.
pub fn artifact_commit_message(message: &str) -> String {
    format!("{message}\n\n\n{ARTIFACTS_MARKER}\n")
}

/// Filters out package changes that originate from automated build commits.
///
/// Commit lookups are memoized, so each distinct commit id is shown once.
pub struct ArtifactLoopGuard<'a> {
    vcs: &'a dyn Vcs,
    root: &'a Path,
    verdicts: HashMap<String, bool>,
}

impl<'a> ArtifactLoopGuard<'a> {
    pub fn new(vcs: &'a dyn Vcs, root: &'a Path) -> Self {
        Self {
            vcs,
            root,
            verdicts: HashMap::new(),
        }
    }

    /// Whether `commit` is an automated build commit.
    pub async fn is_build_commit(&mut self, commit: &Commitish) -> Result<bool> {
        let sha = match commit {
            Commitish::Uncommitted => return Ok(false),
            Commitish::Commit(sha) => sha,
        };
        if let Some(verdict) = self.verdicts.get(sha) {
            return Ok(*verdict);
        }
        let message = self.vcs.commit_message(self.root, sha).await?;
        let verdict = is_artifact_commit(&message);
        self.verdicts.insert(sha.clone(), verdict);
        Ok(verdict)
    }

    /// Keep only changes that are genuine source changes.
    ///
    /// Uncommitted changes are always kept.
    pub async fn filter_genuine_changes(
        &mut self,
        changes: Vec<PackageChange>,
    ) -> Result<Vec<PackageChange>> {
        let mut genuine = Vec::with_capacity(changes.len());
        for change in changes {
            if self.is_build_commit(&change.commit).await? {
                debug!(
                    package = %change.package,
                    commit = %change.commit,
                    "skipping package whose latest change is a build commit"
                );
                continue;
            }
            genuine.push(change);
        }
        Ok(genuine)
    }
}
