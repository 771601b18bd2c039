//! End-to-end coverage of the `wtx checkout` CLI against a real git repo.

mod common;

use std::path::{Path, PathBuf};

use common::{run_git, setup_test_repo, wtx_fails, wtx_ok, Home};

/// The slot pool directory `wtx` allocates as a sibling of the repo root,
/// per its `<repo-base>.wt/wt.<n>` layout.
fn slot_pool_dir(repo_root: &Path) -> PathBuf {
    let base = repo_root.file_name().expect("repo root has a name");
    repo_root.parent().expect("repo root has a parent").join(format!("{}.wt", base.to_str().expect("utf8 name")))
}

#[test]
fn checkout_dash_b_creates_a_slot_and_runs_the_agent() {
    let repo = setup_test_repo();
    let home = Home::new();

    wtx_ok(repo.path(), &home, &["checkout", "-b", "feature/new-thing"]);

    let wt_dir = slot_pool_dir(repo.path());
    let slot = wt_dir.join("wt.1");
    assert!(slot.is_dir(), "expected a slot at {}", slot.display());
    let branch = run_git(&slot, &["rev-parse", "--abbrev-ref", "HEAD"]);
    assert_eq!(branch.trim(), "feature/new-thing");
}

#[test]
fn checkout_without_branch_existing_fails() {
    let repo = setup_test_repo();
    let home = Home::new();

    let stderr = wtx_fails(repo.path(), &home, &["checkout", "no-such-branch"]);
    assert!(stderr.contains("no-such-branch"), "stderr was: {stderr}");
}

#[test]
fn reopening_the_same_branch_reuses_the_first_slot() {
    let repo = setup_test_repo();
    let home = Home::new();

    wtx_ok(repo.path(), &home, &["checkout", "-b", "feature/reused"]);
    wtx_ok(repo.path(), &home, &["checkout", "feature/reused"]);

    let wt_dir = slot_pool_dir(repo.path());
    let entries: Vec<_> = std::fs::read_dir(&wt_dir).expect("read_dir").filter_map(Result::ok).collect();
    assert_eq!(entries.len(), 1, "checking out the same branch twice must not allocate a second slot");
}

#[test]
fn dash_b_flags_require_new_branch() {
    let repo = setup_test_repo();
    let home = Home::new();

    let stderr = wtx_fails(repo.path(), &home, &["checkout", "--from", "main", "some-branch"]);
    assert!(stderr.contains("-b"), "stderr was: {stderr}");
}

#[test]
fn doctor_reports_git_present() {
    let repo = setup_test_repo();
    let home = Home::new();

    let stdout = wtx_ok(repo.path(), &home, &["doctor"]);
    assert!(stdout.to_lowercase().contains("git"), "stdout was: {stdout}");
}

#[test]
fn config_prints_resolved_path() {
    let repo = setup_test_repo();
    let home = Home::new();

    let stdout = wtx_ok(repo.path(), &home, &["config"]);
    assert!(stdout.contains(&home.config_path().display().to_string()), "stdout was: {stdout}");
}

#[test]
fn completions_writes_a_script_under_home() {
    let repo = setup_test_repo();
    let home = Home::new();

    wtx_ok(repo.path(), &home, &["completions", "bash"]);

    let script = home.path().join(".wtx").join("completions").join("_wtx");
    assert!(script.is_file(), "expected a completion script at {}", script.display());
    let contents = std::fs::read_to_string(&script).expect("read completion script");
    assert!(contents.contains("wtx"), "completion script should mention the binary name");
}

#[test]
fn bare_invocation_in_test_mode_prints_a_banner_without_a_terminal() {
    let repo = setup_test_repo();
    let home = Home::new();

    let stdout = wtx_ok(repo.path(), &home, &[]);
    assert!(stdout.contains("test mode"), "stdout was: {stdout}");
}
