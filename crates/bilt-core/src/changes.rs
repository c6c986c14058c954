//! Change scanning: which packages changed, and in which commit.
//!
//! Uncommitted files come first, then every file of every commit, newest
//! commit first. The first file that falls inside a package decides that
//! package's latest change.

use std::path::Path;

use tracing::debug;

use crate::domain::error::Result;
use crate::domain::package::{Commitish, Package, PackageChange};
use crate::git::Vcs;

/// A changed file and the commit it was changed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    /// Root-relative, `/`-separated path.
    pub path: String,
    pub commit: Commitish,
}

/// List changed files, most recent first.
pub async fn find_changed_files(vcs: &dyn Vcs, root: &Path) -> Result<Vec<ChangedFile>> {
    let mut files: Vec<ChangedFile> = vcs
        .uncommitted_files(root)
        .await?
        .into_iter()
        .map(|path| ChangedFile {
            path,
            commit: Commitish::Uncommitted,
        })
        .collect();

    for entry in vcs.commit_history(root).await? {
        files.extend(entry.paths.into_iter().map(|path| ChangedFile {
            path,
            commit: Commitish::Commit(entry.commit.clone()),
        }));
    }

    debug!(count = files.len(), "found changed files");
    Ok(files)
}

/// Map changed files to the latest change of each package.
///
/// Packages without any changed file are absent from the result.
pub fn find_latest_package_changes(
    changed_files: &[ChangedFile],
    packages: &[Package],
) -> Vec<PackageChange> {
    packages
        .iter()
        .filter_map(|package| {
            changed_files
                .iter()
                .find(|file| package.contains_path(&file.path))
                .map(|file| PackageChange {
                    package: package.clone(),
                    commit: file.commit.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingVcs;

    fn file(path: &str, commit: Commitish) -> ChangedFile {
        ChangedFile {
            path: path.to_string(),
            commit,
        }
    }

    #[tokio::test]
    async fn uncommitted_files_come_before_history() {
        let vcs = RecordingVcs::new()
            .with_uncommitted(&["packages/a/dirty.js"])
            .with_commit("c2", "newer", &["packages/b/x.js"])
            .with_commit("c1", "older", &["packages/a/y.js", "packages/b/y.js"]);

        let files = find_changed_files(&vcs, Path::new("/repo")).await.unwrap();
        assert_eq!(
            files,
            vec![
                file("packages/a/dirty.js", Commitish::Uncommitted),
                file("packages/b/x.js", Commitish::commit("c2")),
                file("packages/a/y.js", Commitish::commit("c1")),
                file("packages/b/y.js", Commitish::commit("c1")),
            ]
        );
    }

    #[test]
    fn latest_change_wins_per_package() {
        let files = vec![
            file("packages/a/dirty.js", Commitish::Uncommitted),
            file("packages/b/x.js", Commitish::commit("c2")),
            file("packages/a/y.js", Commitish::commit("c1")),
            file("packages/b/y.js", Commitish::commit("c1")),
        ];
        let packages = vec![
            Package::new("packages/a"),
            Package::new("packages/b"),
            Package::new("packages/c"),
        ];

        let changes = find_latest_package_changes(&files, &packages);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].package, Package::new("packages/a"));
        assert_eq!(changes[0].commit, Commitish::Uncommitted);
        assert_eq!(changes[1].package, Package::new("packages/b"));
        assert_eq!(changes[1].commit, Commitish::commit("c2"));
    }

    #[test]
    fn sibling_prefix_is_not_a_match() {
        let files = vec![file("packages/ab/x.js", Commitish::commit("c1"))];
        let changes = find_latest_package_changes(&files, &[Package::new("packages/a")]);
        assert!(changes.is_empty());
    }
}
