//! Build executor: runs a build action over a build order and streams outcomes.
//!
//! A package starts once all of its in-set dependencies built successfully,
//! with at most `jobs` builds in flight. Outcomes are sent on a channel in
//! completion order, and a package's outcome is always sent after the
//! outcomes of all its dependencies. A package with a failed dependency is
//! never run; it is reported as a failure once its last dependency settles.
//!
//! No new build starts while the consumer still holds a delivered outcome:
//! an outcome is acknowledged when the stream is polled for the next one,
//! so whatever the consumer does with an outcome (staging it with
//! `git add`) never overlaps a build that was started after it.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, instrument};

use crate::domain::outcome::{BuildError, BuildOutcome};
use crate::domain::package::{Package, PackageInfo, PackageInfos};

/// Ordered stream of build outcomes, one per package.
pub type OutcomeStream = BoxStream<'static, BuildOutcome>;

/// An outcome and the acknowledgement fired once the consumer is done with it.
type Delivery = (BuildOutcome, oneshot::Sender<()>);

/// The per-package build step plugged into the executor.
#[async_trait]
pub trait BuildAction: Send + Sync {
    /// Build one package.
    async fn build_package(&self, package: &PackageInfo) -> Result<(), BuildError>;
}

/// Build action that builds nothing and records the order it was invoked in.
#[derive(Debug, Default, Clone)]
pub struct DryRunAction {
    built: Arc<Mutex<Vec<String>>>,
}

impl DryRunAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories "built" so far, in invocation order.
    pub fn build_order(&self) -> Vec<String> {
        self.built
            .lock()
            .map(|built| built.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BuildAction for DryRunAction {
    async fn build_package(&self, package: &PackageInfo) -> Result<(), BuildError> {
        self.built
            .lock()
            .map_err(|e| BuildError::Aborted(e.to_string()))?
            .push(package.directory().to_string());
        Ok(())
    }
}

/// Start building `infos` in `order` and return the outcome stream.
///
/// Must be called inside a Tokio runtime. `jobs` of zero is treated as one.
pub fn execute_build(
    infos: PackageInfos,
    order: Vec<Package>,
    action: Arc<dyn BuildAction>,
    jobs: usize,
) -> OutcomeStream {
    let (tx, rx) = mpsc::channel::<Delivery>(order.len().max(1));
    tokio::spawn(drive(infos, order, action, jobs.max(1), tx));
    stream::unfold((rx, None::<oneshot::Sender<()>>), |(mut rx, handled)| async move {
        // Polling again means the previous outcome has been dealt with.
        if let Some(ack) = handled {
            let _ = ack.send(());
        }
        let (outcome, ack) = rx.recv().await?;
        Some((outcome, (rx, Some(ack))))
    })
    .boxed()
}

/// Bookkeeping for packages that are not settled yet.
struct Schedule {
    /// Position of each package in the build order.
    position: HashMap<String, usize>,
    /// Unsettled in-set dependencies per package.
    pending: HashMap<String, usize>,
    /// In-set dependents per package.
    dependents: HashMap<String, Vec<String>>,
    /// First failed dependency of a package that can no longer build.
    doomed: HashMap<String, String>,
    /// Packages whose dependencies all succeeded, keyed by build-order position.
    ready: BTreeMap<usize, String>,
    settled: HashSet<String>,
}

impl Schedule {
    fn new(infos: &PackageInfos, order: &[Package]) -> Self {
        let position: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(i, p)| (p.directory().to_string(), i))
            .collect();
        let mut pending = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut ready = BTreeMap::new();

        for (i, package) in order.iter().enumerate() {
            let deps: Vec<&str> = infos
                .get(package.directory())
                .map(|info| {
                    info.dependencies
                        .iter()
                        .map(Package::directory)
                        .filter(|d| position.contains_key(*d) && *d != package.directory())
                        .collect()
                })
                .unwrap_or_default();
            for dep in &deps {
                dependents
                    .entry(dep.to_string())
                    .or_default()
                    .push(package.directory().to_string());
            }
            if deps.is_empty() {
                ready.insert(i, package.directory().to_string());
            }
            pending.insert(package.directory().to_string(), deps.len());
        }

        Self {
            position,
            pending,
            dependents,
            doomed: HashMap::new(),
            ready,
            settled: HashSet::new(),
        }
    }

    /// Record `outcome` and return the packages that became unbuildable.
    fn settle(&mut self, outcome: &BuildOutcome) -> Vec<BuildOutcome> {
        let directory = outcome.package.directory().to_string();
        self.settled.insert(directory.clone());

        let mut cascaded = Vec::new();
        for dependent in self.dependents.get(&directory).cloned().unwrap_or_default() {
            if !outcome.is_success() {
                self.doomed
                    .entry(dependent.clone())
                    .or_insert_with(|| directory.clone());
            }
            let Some(remaining) = self.pending.get_mut(&dependent) else {
                continue;
            };
            *remaining = remaining.saturating_sub(1);
            if *remaining > 0 {
                continue;
            }
            match self.doomed.get(&dependent) {
                Some(failed) => cascaded.push(BuildOutcome::failure(
                    Package::new(&dependent),
                    BuildError::DependencyFailed {
                        dependency: failed.clone(),
                    },
                )),
                None => {
                    if let Some(pos) = self.position.get(&dependent) {
                        self.ready.insert(*pos, dependent);
                    }
                }
            }
        }
        cascaded
    }
}

#[instrument(skip_all, fields(packages = order.len(), jobs = jobs))]
async fn drive(
    infos: PackageInfos,
    order: Vec<Package>,
    action: Arc<dyn BuildAction>,
    jobs: usize,
    tx: mpsc::Sender<Delivery>,
) {
    let mut schedule = Schedule::new(&infos, &order);
    let mut running: JoinSet<BuildOutcome> = JoinSet::new();

    loop {
        while running.len() < jobs {
            let Some((_, directory)) = schedule.ready.pop_first() else {
                break;
            };
            let Some(info) = infos.get(&directory).cloned() else {
                continue;
            };
            let action = Arc::clone(&action);
            debug!(package = %directory, "starting build");
            running.spawn(async move {
                let result = AssertUnwindSafe(action.build_package(&info))
                    .catch_unwind()
                    .await;
                match result {
                    Ok(Ok(())) => BuildOutcome::success(info.package),
                    Ok(Err(e)) => BuildOutcome::failure(info.package, e),
                    Err(_) => BuildOutcome::failure(
                        info.package,
                        BuildError::Aborted("build action panicked".to_string()),
                    ),
                }
            });
        }

        let Some(joined) = running.join_next().await else {
            break;
        };
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "build task lost");
                continue;
            }
        };

        let mut queue = VecDeque::from([outcome]);
        let mut unacknowledged = Vec::new();
        while let Some(outcome) = queue.pop_front() {
            queue.extend(schedule.settle(&outcome));
            let (ack, handled) = oneshot::channel();
            if tx.send((outcome, ack)).await.is_err() {
                debug!("outcome receiver dropped, stopping");
                return;
            }
            unacknowledged.push(handled);
        }
        // Refill only once the consumer has handled everything it was sent.
        for handled in unacknowledged {
            if handled.await.is_err() {
                debug!("outcome stream dropped, stopping");
                return;
            }
        }
    }

    // Unsettled packages lost their task.
    for package in order {
        if !schedule.settled.contains(package.directory()) {
            let outcome = BuildOutcome::failure(
                package,
                BuildError::Aborted("build task lost".to_string()),
            );
            let (ack, _handled) = oneshot::channel();
            if tx.send((outcome, ack)).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::BuildStatus;
    use std::time::Duration;

    fn infos(edges: &[(&str, &[&str])]) -> PackageInfos {
        edges
            .iter()
            .map(|(dir, deps)| {
                (
                    dir.to_string(),
                    PackageInfo::new(
                        Package::new(dir),
                        *dir,
                        deps.iter().map(Package::new).collect(),
                    ),
                )
            })
            .collect()
    }

    fn order(dirs: &[&str]) -> Vec<Package> {
        dirs.iter().map(Package::new).collect()
    }

    /// Fails the listed packages, optionally sleeping per package first.
    struct ScriptedAction {
        fail: Vec<&'static str>,
        delays: HashMap<&'static str, u64>,
        panic_on: Option<&'static str>,
    }

    impl ScriptedAction {
        fn failing(fail: &[&'static str]) -> Self {
            Self {
                fail: fail.to_vec(),
                delays: HashMap::new(),
                panic_on: None,
            }
        }
    }

    #[async_trait]
    impl BuildAction for ScriptedAction {
        async fn build_package(&self, package: &PackageInfo) -> Result<(), BuildError> {
            if let Some(ms) = self.delays.get(package.directory()) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if self.panic_on == Some(package.directory()) {
                panic!("boom");
            }
            if self.fail.iter().any(|f| *f == package.directory()) {
                return Err(BuildError::ActionFailed(format!(
                    "{} failed",
                    package.directory()
                )));
            }
            Ok(())
        }
    }

    async fn collect(stream: OutcomeStream) -> Vec<BuildOutcome> {
        stream.collect().await
    }

    #[tokio::test]
    async fn dry_run_records_build_order() {
        let action = DryRunAction::new();
        let outcomes = collect(execute_build(
            infos(&[("a", &[]), ("b", &["a"])]),
            order(&["a", "b"]),
            Arc::new(action.clone()),
            1,
        ))
        .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(BuildOutcome::is_success));
        assert_eq!(action.build_order(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failure_does_not_stop_independent_packages() {
        let outcomes = collect(execute_build(
            infos(&[("a", &[]), ("b", &[]), ("c", &[])]),
            order(&["a", "b", "c"]),
            Arc::new(ScriptedAction::failing(&["b"])),
            1,
        ))
        .await;

        let statuses: Vec<(&str, BuildStatus)> = outcomes
            .iter()
            .map(|o| (o.package.directory(), o.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("a", BuildStatus::Success),
                ("b", BuildStatus::Failure),
                ("c", BuildStatus::Success),
            ]
        );
    }

    #[tokio::test]
    async fn dependents_of_failed_package_are_not_built() {
        let dry = DryRunAction::new();
        struct FailA(DryRunAction);
        #[async_trait]
        impl BuildAction for FailA {
            async fn build_package(&self, package: &PackageInfo) -> Result<(), BuildError> {
                self.0.build_package(package).await?;
                if package.directory() == "a" {
                    return Err(BuildError::ActionFailed("nope".to_string()));
                }
                Ok(())
            }
        }

        let outcomes = collect(execute_build(
            infos(&[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &[])]),
            order(&["a", "d", "b", "c"]),
            Arc::new(FailA(dry.clone())),
            1,
        ))
        .await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(dry.build_order(), vec!["a", "d"]);
        let c = outcomes
            .iter()
            .find(|o| o.package.directory() == "c")
            .unwrap();
        assert_eq!(
            c.error,
            Some(BuildError::DependencyFailed {
                dependency: "b".to_string()
            })
        );
    }

    #[tokio::test]
    async fn dependent_waits_for_all_dependencies_even_after_a_failure() {
        // c depends on a (fails fast) and b (slow); c must be reported after b.
        let mut action = ScriptedAction::failing(&["a"]);
        action.delays.insert("b", 50);

        let outcomes = collect(execute_build(
            infos(&[("a", &[]), ("b", &[]), ("c", &["a", "b"])]),
            order(&["a", "b", "c"]),
            Arc::new(action),
            2,
        ))
        .await;

        let seen: Vec<&str> = outcomes.iter().map(|o| o.package.directory()).collect();
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(!outcomes[2].is_success());
    }

    #[tokio::test]
    async fn parallel_jobs_respect_dependency_order() {
        let mut action = ScriptedAction::failing(&[]);
        action.delays.insert("a", 30);

        let outcomes = collect(execute_build(
            infos(&[("a", &[]), ("b", &[]), ("c", &["a"])]),
            order(&["a", "b", "c"]),
            Arc::new(action),
            4,
        ))
        .await;

        let seen: Vec<&str> = outcomes.iter().map(|o| o.package.directory()).collect();
        let a = seen.iter().position(|d| *d == "a").unwrap();
        let c = seen.iter().position(|d| *d == "c").unwrap();
        assert!(a < c, "a must be observed before c: {seen:?}");
        assert_eq!(seen[0], "b", "independent fast package finishes first");
    }

    #[tokio::test]
    async fn panicking_action_is_a_failure() {
        let mut action = ScriptedAction::failing(&[]);
        action.panic_on = Some("a");

        let outcomes = collect(execute_build(
            infos(&[("a", &[]), ("b", &[])]),
            order(&["a", "b"]),
            Arc::new(action),
            1,
        ))
        .await;

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].error, Some(BuildError::Aborted(_))));
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn next_build_waits_until_outcome_is_handled() {
        let action = DryRunAction::new();
        let mut outcomes = execute_build(
            infos(&[("a", &[]), ("b", &[])]),
            order(&["a", "b"]),
            Arc::new(action.clone()),
            1,
        );

        let first = outcomes.next().await.unwrap();
        assert_eq!(first.package.directory(), "a");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(action.build_order(), vec!["a"], "b started before a was handled");

        let second = outcomes.next().await.unwrap();
        assert_eq!(second.package.directory(), "b");
        assert!(outcomes.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_build() {
        let action = DryRunAction::new();
        let mut outcomes = execute_build(
            infos(&[("a", &[]), ("b", &[])]),
            order(&["a", "b"]),
            Arc::new(action.clone()),
            1,
        );

        outcomes.next().await.unwrap();
        drop(outcomes);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(action.build_order(), vec!["a"]);
    }

    #[tokio::test]
    async fn empty_build_yields_empty_stream() {
        let outcomes = collect(execute_build(
            PackageInfos::new(),
            Vec::new(),
            Arc::new(DryRunAction::new()),
            1,
        ))
        .await;
        assert!(outcomes.is_empty());
    }
}
