//! Integration tests for PackageBuilder against scratch package directories.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bilt_build::{PackageBuilder, StepConfig};
use bilt_core::{execute_build, BuildAction, BuildError, Package, PackageInfo, PackageInfos};
use futures::StreamExt;

fn sh(name: &str, script: &str) -> StepConfig {
    StepConfig::custom(
        name,
        vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        60,
    )
}

fn package(root: &Path, dir: &str) -> PackageInfo {
    fs::create_dir_all(root.join(dir)).unwrap();
    PackageInfo::new(Package::new(dir), dir, Vec::new())
}

/// Test: steps run in order inside the package directory
#[tokio::test]
async fn test_steps_run_in_package_directory() {
    let root = tempfile::tempdir().unwrap();
    let info = package(root.path(), "packages/a");
    let builder = PackageBuilder::new(
        root.path(),
        vec![
            sh("first", "echo first >> log.txt"),
            sh("second", "echo second >> log.txt"),
        ],
    );

    builder.build_package(&info).await.expect("build failed");

    let log = fs::read_to_string(root.path().join("packages/a/log.txt")).unwrap();
    assert_eq!(log, "first\nsecond\n");
}

/// Test: the first failing step stops the build and names itself
#[tokio::test]
async fn test_failing_step_stops_the_build() {
    let root = tempfile::tempdir().unwrap();
    let info = package(root.path(), "a");
    let builder = PackageBuilder::new(
        root.path(),
        vec![
            sh("compile", "echo broken source >&2; exit 3"),
            sh("after", "touch after.txt"),
        ],
    );

    let err = builder.build_package(&info).await.unwrap_err();
    match err {
        BuildError::ActionFailed(message) => {
            assert!(message.contains("step compile failed with exit code 3"), "{message}");
            assert!(message.contains("broken source"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!root.path().join("a/after.txt").exists());
}

/// Test: disabled steps are skipped
#[tokio::test]
async fn test_disabled_step_is_skipped() {
    let root = tempfile::tempdir().unwrap();
    let info = package(root.path(), "a");
    let builder = PackageBuilder::new(
        root.path(),
        vec![sh("fail", "exit 1").disabled(), sh("ok", "touch ok.txt")],
    );

    builder.build_package(&info).await.expect("build failed");
    assert!(root.path().join("a/ok.txt").exists());
}

/// Test: a step that cannot start fails the package
#[tokio::test]
async fn test_missing_program_fails_the_package() {
    let root = tempfile::tempdir().unwrap();
    let info = package(root.path(), "a");
    let builder = PackageBuilder::new(
        root.path(),
        vec![StepConfig::custom(
            "ghost",
            vec!["bilt-no-such-program".to_string()],
            0,
        )],
    );

    let err = builder.build_package(&info).await.unwrap_err();
    assert!(err.to_string().contains("failed to run step ghost"));
}

/// Test: the builder drives a whole build through the executor
#[tokio::test]
async fn test_builder_through_executor() {
    let root = tempfile::tempdir().unwrap();
    let a = package(root.path(), "a");
    let b = PackageInfo::new(Package::new("b"), "b", vec![Package::new("a")]);
    fs::create_dir_all(root.path().join("b")).unwrap();
    let infos: PackageInfos = [("a".to_string(), a), ("b".to_string(), b)]
        .into_iter()
        .collect();

    let builder = PackageBuilder::new(root.path(), vec![sh("build", "touch built")]);
    let outcomes: Vec<_> = execute_build(
        infos,
        vec![Package::new("a"), Package::new("b")],
        Arc::new(builder),
        1,
    )
    .collect()
    .await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_success()));
    assert!(root.path().join("a/built").exists());
    assert!(root.path().join("b/built").exists());
}
