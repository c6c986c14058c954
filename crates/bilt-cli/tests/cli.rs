//! Runs the `bilt` binary against scratch repositories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn run_git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn bilt(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bilt"))
        .args(args)
        .env("BILT_ROOT", root)
        .env_remove("BILT_STEPS")
        .env_remove("BILT_JOBS")
        .env_remove("BILT_MESSAGE")
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

/// Repository with `a` and `b` (depends on `a`), both committed.
fn make_git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    for (name, json) in [
        ("a", r#"{"name":"a"}"#),
        ("b", r#"{"name":"b","dependencies":{"a":"*"}}"#),
    ] {
        fs::create_dir_all(dir.path().join(name)).unwrap();
        fs::write(dir.path().join(name).join("package.json"), json).unwrap();
    }
    run_git(dir.path(), &["add", "."]);
    run_git(dir.path(), &["commit", "-m", "add packages"]);
    dir
}

#[test]
fn dry_run_prints_build_order() {
    let repo = make_git_repo();
    let output = bilt(repo.path(), &["--dry-run"]);

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().last(), Some("a, b"));
}

#[test]
fn forced_dry_run_of_one_package() {
    let repo = make_git_repo();
    let output = bilt(repo.path(), &["--dry-run", "--force", "b"]);

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().last(), Some("b"));
}

#[test]
fn git_failure_exits_with_one() {
    let repo = make_git_repo();
    // No remote: the pull fails before anything is built.
    let output = bilt(repo.path(), &["--steps", "noop=true"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn unknown_step_exits_with_one() {
    let repo = make_git_repo();
    let output = bilt(repo.path(), &["--steps", "deploy"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn version_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_bilt"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("bilt "));
}
