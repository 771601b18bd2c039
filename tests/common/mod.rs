//! Shared helpers for `wtx` integration tests.
//!
//! Each test gets its own throwaway git repo and its own throwaway
//! `$HOME`, so runs never touch the real `~/.wtx`.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Create a fresh git repo with one commit on `main`.
pub fn setup_test_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    run_git(dir.path(), &["init", "--initial-branch=main", "-q"]);
    std::fs::write(dir.path().join("README.md"), "# test repo\n").expect("write README");
    run_git(dir.path(), &["add", "."]);
    run_git(dir.path(), &["commit", "-q", "-m", "initial commit"]);
    dir
}

fn git_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "wtx tests")
        .env("GIT_AUTHOR_EMAIL", "wtx-tests@example.invalid")
        .env("GIT_COMMITTER_NAME", "wtx tests")
        .env("GIT_COMMITTER_EMAIL", "wtx-tests@example.invalid");
    cmd
}

/// Run `git` in `dir`. Panics on failure.
pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let out = git_command(dir, args).output().unwrap_or_else(|e| panic!("failed to run git {}: {e}", args.join(" ")));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "git {} failed:\nstdout: {stdout}\nstderr: {stderr}", args.join(" "));
    stdout.to_string()
}

/// A throwaway `$HOME` with `~/.wtx/config.json` pre-seeded so the binary
/// never blocks on an unconfigured `agent_command`.
pub struct Home {
    dir: TempDir,
}

impl Home {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create home dir");
        let wtx_dir = dir.path().join(".wtx");
        std::fs::create_dir_all(&wtx_dir).expect("mkdir .wtx");
        std::fs::write(wtx_dir.join("config.json"), br#"{"agent_command": ["true"]}"#).expect("write config.json");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join(".wtx").join("config.json")
    }
}

/// Run the `wtx` binary with `dir` as cwd and `home` as `$HOME`.
pub fn wtx_in(dir: &Path, home: &Home, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wtx"))
        .args(args)
        .current_dir(dir)
        .env("HOME", home.path())
        .env("WTX_TEST_MODE", "")
        .output()
        .expect("failed to execute wtx")
}

/// Run `wtx` and assert it succeeds. Returns stdout as a string.
pub fn wtx_ok(dir: &Path, home: &Home, args: &[&str]) -> String {
    let out = wtx_in(dir, home, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "wtx {} failed:\nstdout: {stdout}\nstderr: {stderr}", args.join(" "));
    stdout.to_string()
}

/// Run `wtx` and assert it fails. Returns stderr as a string.
pub fn wtx_fails(dir: &Path, home: &Home, args: &[&str]) -> String {
    let out = wtx_in(dir, home, args);
    assert!(
        !out.status.success(),
        "expected wtx {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}
