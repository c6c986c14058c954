//! Package discovery and metadata for npm-style repositories.
//!
//! A package is any directory holding a `package.json`. Dependency edges are
//! the declared dependencies whose names resolve to other packages of the
//! same set; everything else is an external dependency and is ignored.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path};

use serde::Deserialize;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::domain::error::{BiltError, Result};
use crate::domain::package::{Package, PackageInfo, PackageInfos};

const MANIFEST: &str = "package.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    name: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, serde_json::Value>,
}

impl PackageJson {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .chain(self.peer_dependencies.keys())
            .chain(self.optional_dependencies.keys())
            .map(String::as_str)
    }
}

fn is_ignored(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name == "node_modules" || name.starts_with('.'))
}

/// Root-relative, `/`-separated form of `dir`.
fn relative_directory(root: &Path, dir: &Path) -> Option<String> {
    let relative = dir.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Find every package under `root`, sorted by directory.
pub fn find_packages(root: &Path) -> Result<Vec<Package>> {
    let mut packages = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_ignored(e)) {
        let entry = entry.map_err(|e| BiltError::Io(e.into()))?;
        if !entry.file_type().is_file() || entry.file_name() != MANIFEST {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        if let Some(relative) = relative_directory(root, dir) {
            packages.push(Package::new(relative));
        }
    }
    packages.sort();
    packages.dedup();
    debug!(count = packages.len(), "discovered packages");
    Ok(packages)
}

fn read_package_json(root: &Path, package: &Package) -> Result<PackageJson> {
    let dir = root.join(package.directory());
    let path = dir.join(MANIFEST);
    let content = std::fs::read_to_string(&path).map_err(|e| BiltError::PackageJson {
        path: dir.clone(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| BiltError::PackageJson {
        path: dir,
        reason: e.to_string(),
    })
}

/// Load metadata for `packages`, resolving dependencies among them.
pub fn load_package_infos(root: &Path, packages: &[Package]) -> Result<PackageInfos> {
    let mut manifests = Vec::with_capacity(packages.len());
    for package in packages {
        let manifest = read_package_json(root, package)?;
        let name = manifest.name.clone().ok_or_else(|| BiltError::InvalidPackage {
            package: package.to_string(),
            reason: "package.json has no name".to_string(),
        })?;
        manifests.push((package.clone(), name, manifest));
    }

    let by_name: HashMap<&str, &Package> = manifests
        .iter()
        .map(|(package, name, _)| (name.as_str(), package))
        .collect();

    let mut infos = PackageInfos::new();
    for (package, name, manifest) in &manifests {
        let mut dependencies: Vec<Package> = manifest
            .dependency_names()
            .filter_map(|dep| by_name.get(dep).map(|p| (*p).clone()))
            .filter(|dep| dep != package)
            .collect();
        dependencies.sort();
        dependencies.dedup();
        infos.insert(
            package.directory().to_string(),
            PackageInfo::new(package.clone(), name.clone(), dependencies),
        );
    }
    Ok(infos)
}
