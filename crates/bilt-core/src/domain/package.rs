//! Package identity, metadata and change records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A package in the repository.
///
/// The repository-relative directory is the only identity: two packages
/// with the same directory are the same package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Package {
    pub directory: String,
}

impl Package {
    /// Create a package from a root-relative directory.
    ///
    /// The directory is normalised to `/` separators without a leading `./`
    /// or trailing `/`; the repository root itself is `"."`.
    pub fn new(directory: impl AsRef<str>) -> Self {
        let normalized = directory.as_ref().replace('\\', "/");
        let mut dir = normalized.as_str();
        while let Some(rest) = dir.strip_prefix("./") {
            dir = rest;
        }
        let dir = dir.trim_end_matches('/');
        Self {
            directory: if dir.is_empty() {
                ".".to_string()
            } else {
                dir.to_string()
            },
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Whether a root-relative file path lies inside this package.
    pub fn contains_path(&self, path: &str) -> bool {
        if self.directory == "." {
            return true;
        }
        path.strip_prefix(self.directory.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directory)
    }
}

/// A package plus the metadata needed to plan and run its build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub package: Package,
    /// Declared package name (e.g. the `name` field of `package.json`).
    pub name: String,
    /// In-repository packages this package depends on.
    pub dependencies: Vec<Package>,
}

impl PackageInfo {
    pub fn new(package: Package, name: impl Into<String>, dependencies: Vec<Package>) -> Self {
        Self {
            package,
            name: name.into(),
            dependencies,
        }
    }

    pub fn directory(&self) -> &str {
        self.package.directory()
    }
}

/// Package metadata keyed by package directory.
pub type PackageInfos = BTreeMap<String, PackageInfo>;

/// The commit a change was observed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Commitish {
    /// Modification in the working tree that is not committed yet.
    Uncommitted,
    /// A real commit id.
    Commit(String),
}

impl Commitish {
    pub fn commit(sha: impl Into<String>) -> Self {
        Commitish::Commit(sha.into())
    }

    pub fn is_uncommitted(&self) -> bool {
        matches!(self, Commitish::Uncommitted)
    }
}

impl fmt::Display for Commitish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Commitish::Uncommitted => f.write_str("<uncommitted>"),
            Commitish::Commit(sha) => f.write_str(sha),
        }
    }
}

/// The latest change relevant to a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChange {
    pub package: Package,
    pub commit: Commitish,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_directory_is_normalized() {
        assert_eq!(Package::new("./packages/a/").directory(), "packages/a");
        assert_eq!(Package::new("packages\\b").directory(), "packages/b");
        assert_eq!(Package::new("").directory(), ".");
        assert_eq!(Package::new("./").directory(), ".");
    }

    #[test]
    fn same_directory_is_same_package() {
        assert_eq!(Package::new("packages/a"), Package::new("./packages/a/"));
    }

    #[test]
    fn contains_path_respects_directory_boundaries() {
        let pkg = Package::new("packages/a");
        assert!(pkg.contains_path("packages/a/src/index.js"));
        assert!(pkg.contains_path("packages/a"));
        assert!(!pkg.contains_path("packages/ab/index.js"));
        assert!(!pkg.contains_path("packages/b/index.js"));
    }

    #[test]
    fn root_package_contains_everything() {
        assert!(Package::new(".").contains_path("anything/at/all.txt"));
    }

    #[test]
    fn commitish_display() {
        assert_eq!(Commitish::commit("abc123").to_string(), "abc123");
        assert!(Commitish::Uncommitted.is_uncommitted());
        assert!(!Commitish::commit("abc").is_uncommitted());
    }
}
