//! Build-set selection.
//!
//! Combines the explicit package selection, the "build up to" targets and
//! the force flag with change detection into the final set of packages to
//! build. The result is computed once per cycle and never changes after.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::changes::{find_changed_files, find_latest_package_changes};
use crate::discovery::{find_packages, load_package_infos};
use crate::domain::error::Result;
use crate::domain::package::{Package, PackageChange, PackageInfos};
use crate::git::Vcs;
use crate::graph::{calculate_packages_to_build, restrict_package_infos};
use crate::loop_guard::ArtifactLoopGuard;

/// The final build set of a cycle.
#[derive(Debug, Clone, Default)]
pub struct BuildSelection {
    /// Packages to build, keyed by directory.
    pub package_infos: PackageInfos,
    /// Genuine changes that seeded the build set (empty when forced).
    pub changed: Vec<PackageChange>,
}

impl BuildSelection {
    pub fn is_empty(&self) -> bool {
        self.package_infos.is_empty()
    }

    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.package_infos.keys().map(String::as_str)
    }
}

/// Union of the explicit selection and the up-to targets, first occurrence wins.
pub fn merge_packages(initial: &[Package], upto: &[Package]) -> Vec<Package> {
    let mut seen = HashSet::new();
    initial
        .iter()
        .chain(upto)
        .filter(|p| seen.insert(p.directory().to_string()))
        .cloned()
        .collect()
}

/// Selects what to build in one cycle.
pub struct BuildSetSelector<'a> {
    vcs: &'a dyn Vcs,
    root: &'a Path,
}

impl<'a> BuildSetSelector<'a> {
    pub fn new(vcs: &'a dyn Vcs, root: &'a Path) -> Self {
        Self { vcs, root }
    }

    /// Packages considered in this cycle: the explicit selection plus the
    /// up-to targets, or every package in the repository when nothing was
    /// selected explicitly.
    pub fn scanning_universe(&self, packages: &[Package], upto: &[Package]) -> Result<Vec<Package>> {
        if packages.is_empty() {
            return find_packages(self.root);
        }
        let (present, missing): (Vec<Package>, Vec<Package>) = merge_packages(packages, upto)
            .into_iter()
            .partition(|p| self.root.join(p.directory()).join("package.json").is_file());
        for package in &missing {
            warn!(package = %package, "selected package has no package.json, ignoring it");
        }
        Ok(present)
    }

    /// Compute the final build set.
    ///
    /// With `force`, exactly the explicit selection (restricted to known
    /// packages) is built. Otherwise the packages that genuinely changed
    /// since their last build, plus everything depending on them, bounded
    /// by `upto` when it is non-empty.
    pub async fn select(
        &self,
        packages: &[Package],
        upto: &[Package],
        force: bool,
    ) -> Result<BuildSelection> {
        let universe = self.scanning_universe(packages, upto)?;
        let infos = load_package_infos(self.root, &universe)?;
        debug!(universe = universe.len(), "loaded package infos");

        for target in upto {
            if !infos.contains_key(target.directory()) {
                warn!(package = %target, "up-to package is not a known package");
            }
        }

        if force {
            let package_infos = restrict_package_infos(&infos, packages);
            info!(count = package_infos.len(), "forced build, skipping change detection");
            return Ok(BuildSelection {
                package_infos,
                changed: Vec::new(),
            });
        }

        let changed_files = find_changed_files(self.vcs, self.root).await?;
        let candidates = find_latest_package_changes(&changed_files, &universe);
        let changed = ArtifactLoopGuard::new(self.vcs, self.root)
            .filter_genuine_changes(candidates)
            .await?;
        let changed_packages: Vec<Package> = changed.iter().map(|c| c.package.clone()).collect();
        debug!(changed = ?changed_packages, "packages changed since last build");

        let package_infos = calculate_packages_to_build(&infos, &changed_packages, upto);
        Ok(BuildSelection {
            package_infos,
            changed,
        })
    }
}
