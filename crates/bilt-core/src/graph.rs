//! Package dependency graph: build ordering and build-set expansion.
//!
//! Models packages as nodes in a directed acyclic graph. An edge `A → B`
//! means "B depends on A": A must build before B, and a change to A forces
//! B to rebuild.
//!
//! Ordering uses Kahn's algorithm. Ready packages are taken in directory
//! order, so the same graph always yields the same build order.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::domain::error::{BiltError, Result};
use crate::domain::package::{Package, PackageInfos};

/// Directed dependency graph over package directories.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    nodes: BTreeSet<String>,
    /// `dependency → {dependent, ...}` (downstream adjacency)
    downstream: HashMap<String, BTreeSet<String>>,
    /// `dependent → {dependency, ...}` (upstream adjacency)
    upstream: HashMap<String, BTreeSet<String>>,
}

impl PackageGraph {
    /// Build the graph of `infos`. Edges to packages outside `infos` are dropped.
    pub fn from_infos(infos: &PackageInfos) -> Self {
        let mut graph = Self::default();
        for directory in infos.keys() {
            graph.nodes.insert(directory.clone());
            graph.downstream.entry(directory.clone()).or_default();
            graph.upstream.entry(directory.clone()).or_default();
        }
        for (directory, info) in infos {
            for dependency in &info.dependencies {
                let dependency = dependency.directory();
                if dependency == directory || !graph.nodes.contains(dependency) {
                    continue;
                }
                graph
                    .downstream
                    .entry(dependency.to_string())
                    .or_default()
                    .insert(directory.clone());
                graph
                    .upstream
                    .entry(directory.clone())
                    .or_default()
                    .insert(dependency.to_string());
            }
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, directory: &str) -> bool {
        self.nodes.contains(directory)
    }

    /// Return packages in build order (dependencies before dependents).
    ///
    /// Returns [`BiltError::DependencyCycle`] naming the packages that could
    /// not be ordered.
    pub fn build_order(&self) -> Result<Vec<Package>> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|id| (id.as_str(), self.upstream.get(id).map_or(0, BTreeSet::len)))
            .collect();

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            sorted.push(Package::new(node));
            for dependent in self.downstream.get(node).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(dependent.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(dependent.as_str());
                    }
                }
            }
        }

        if sorted.len() != self.nodes.len() {
            let packages = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(id, _)| id.to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            return Err(BiltError::DependencyCycle { packages });
        }

        Ok(sorted)
    }

    /// Direct in-graph dependencies of `directory`.
    pub fn dependencies_of(&self, directory: &str) -> Result<Vec<Package>> {
        let deps = self
            .upstream
            .get(directory)
            .ok_or_else(|| BiltError::PackageNotFound {
                package: directory.to_string(),
            })?;
        Ok(deps.iter().map(Package::new).collect())
    }

    /// `start` plus everything that transitively depends on it.
    pub fn dependents_closure<'a>(
        &self,
        start: impl IntoIterator<Item = &'a Package>,
    ) -> BTreeSet<String> {
        self.closure(start, &self.downstream)
    }

    /// `start` plus everything it transitively depends on.
    pub fn dependencies_closure<'a>(
        &self,
        start: impl IntoIterator<Item = &'a Package>,
    ) -> BTreeSet<String> {
        self.closure(start, &self.upstream)
    }

    /// BFS over `edges` from the in-graph members of `start`.
    fn closure<'a>(
        &self,
        start: impl IntoIterator<Item = &'a Package>,
        edges: &HashMap<String, BTreeSet<String>>,
    ) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        for package in start {
            if self.nodes.contains(package.directory())
                && visited.insert(package.directory().to_string())
            {
                queue.push_back(package.directory().to_string());
            }
        }
        while let Some(current) = queue.pop_front() {
            for next in edges.get(&current).into_iter().flatten() {
                if visited.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
        visited
    }

    /// Packages to build for a set of changed packages.
    ///
    /// The changed packages and all their transitive dependents. A non-empty
    /// `upto` bounds the dependents only: one is kept if it is an `upto`
    /// package or some `upto` package transitively depends on it. Changed
    /// packages in the graph are always kept.
    pub fn packages_to_build(&self, changed: &[Package], upto: &[Package]) -> Vec<Package> {
        let mut selected: BTreeSet<String> = changed
            .iter()
            .map(Package::directory)
            .filter(|d| self.nodes.contains(*d))
            .map(str::to_string)
            .collect();
        let dependents = self.dependents_closure(changed);
        if upto.is_empty() {
            selected.extend(dependents);
        } else {
            let bound = self.dependencies_closure(upto);
            selected.extend(dependents.intersection(&bound).cloned());
        }
        selected.into_iter().map(Package::new).collect()
    }
}

/// `infos` restricted to `packages`; unknown packages are dropped.
pub fn restrict_package_infos<'a>(
    infos: &PackageInfos,
    packages: impl IntoIterator<Item = &'a Package>,
) -> PackageInfos {
    packages
        .into_iter()
        .filter_map(|package| {
            infos
                .get(package.directory())
                .map(|info| (package.directory().to_string(), info.clone()))
        })
        .collect()
}

/// Build order of `infos`.
pub fn calculate_build_order(infos: &PackageInfos) -> Result<Vec<Package>> {
    PackageGraph::from_infos(infos).build_order()
}

/// Expand `changed` to the infos of every package that must rebuild.
pub fn calculate_packages_to_build(
    infos: &PackageInfos,
    changed: &[Package],
    upto: &[Package],
) -> PackageInfos {
    let graph = PackageGraph::from_infos(infos);
    let selected = graph.packages_to_build(changed, upto);
    restrict_package_infos(infos, &selected)
}
