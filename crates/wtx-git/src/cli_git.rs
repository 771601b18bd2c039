//! [`CliGit`] — a [`GitAccess`] implementation that shells out to the `git` binary.
//!
//! Centralizing every invocation in one small set of private helpers keeps
//! parsing and argument choices in one place; callers should prefer the
//! typed methods on [`GitAccess`] over reaching for `Command` themselves.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::GitError;
use crate::repo::GitAccess;
use crate::types::{BranchRef, StatusLine, WorktreeEntry};

/// Git access backed by the `git` binary, rooted at a working directory.
#[derive(Clone, Debug)]
pub struct CliGit {
    workdir: PathBuf,
}

impl CliGit {
    /// Create a new `CliGit` rooted at `workdir`.
    ///
    /// `workdir` may be any directory inside the worktree; `git -C` resolves
    /// the rest.
    #[must_use]
    pub fn new(workdir: PathBuf) -> Self {
        Self { workdir }
    }

    fn run<I, S>(&self, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_in(&self.workdir, args)
    }

    fn run_in<I, S>(&self, dir: &Path, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().collect();
        let command_label = format!(
            "git {}",
            args.iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        );

        tracing::debug!(command = %command_label, dir = %dir.display(), "running git");

        let output = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(&args)
            .output()
            .map_err(|_| GitError::ToolMissing)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            tracing::warn!(command = %command_label, %stderr, "git command failed");
            return Err(GitError::CommandFailed { command: command_label, stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitAccess for CliGit {
    fn repo_root(&self) -> Result<PathBuf, GitError> {
        let out = self.run(["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(out.trim()))
    }

    fn common_dir(&self) -> Result<PathBuf, GitError> {
        let out = self.run(["rev-parse", "--git-common-dir"])?;
        let raw = PathBuf::from(out.trim());
        if raw.is_absolute() {
            Ok(raw)
        } else {
            Ok(self.workdir.join(raw))
        }
    }

    fn current_branch(&self) -> Result<BranchRef, GitError> {
        let out = self.run(["symbolic-ref", "--short", "-q", "HEAD"]);
        match out {
            Ok(name) => {
                let name = name.trim();
                if name.is_empty() {
                    Ok(BranchRef::Detached)
                } else {
                    Ok(BranchRef::Name(name.to_owned()))
                }
            }
            Err(GitError::CommandFailed { .. }) => Ok(BranchRef::Detached),
            Err(other) => Err(other),
        }
    }

    fn list_worktrees(&self) -> Result<Vec<WorktreeEntry>, GitError> {
        let out = self.run(["worktree", "list", "--porcelain"])?;
        let mut entries = Vec::new();
        let mut current_path: Option<PathBuf> = None;
        let mut current_branch = BranchRef::Detached;

        for line in out.lines() {
            if line.is_empty() {
                if let Some(path) = current_path.take() {
                    entries.push(WorktreeEntry { path, branch: current_branch });
                }
                current_branch = BranchRef::Detached;
            } else if let Some(path) = line.strip_prefix("worktree ") {
                current_path = Some(PathBuf::from(path));
            } else if let Some(branch_ref) = line.strip_prefix("branch ") {
                current_branch = branch_ref
                    .strip_prefix("refs/heads/")
                    .map(|n| BranchRef::Name(n.to_owned()))
                    .unwrap_or(BranchRef::Detached);
            } else if line == "detached" {
                current_branch = BranchRef::Detached;
            }
        }
        if let Some(path) = current_path {
            entries.push(WorktreeEntry { path, branch: current_branch });
        }
        Ok(entries)
    }

    fn list_branches_by_recent_commit(&self, limit: usize) -> Result<Vec<String>, GitError> {
        let out = self.run([
            "for-each-ref",
            "--sort=-committerdate",
            "--format=%(refname:short)",
            "refs/heads/",
        ])?;
        Ok(out.lines().take(limit).map(str::to_owned).collect())
    }

    fn list_local_branches(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(["for-each-ref", "--format=%(refname:short)", "refs/heads/"])?;
        Ok(out.lines().map(str::to_owned).collect())
    }

    fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        Ok(self
            .run(["show-ref", "--verify", "--quiet", &format!("refs/heads/{name}")])
            .is_ok())
    }

    fn branch_exists_local_or_remote(&self, name: &str) -> Result<bool, GitError> {
        if self.branch_exists(name)? {
            return Ok(true);
        }
        let out = self.run(["for-each-ref", "--format=%(refname:short)", "refs/remotes/"])?;
        Ok(out.lines().any(|r| {
            r.split_once('/').map(|(_, branch)| branch) == Some(name)
        }))
    }

    fn list_remotes(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(["remote"])?;
        Ok(out.lines().map(str::to_owned).collect())
    }

    fn fetch(&self, remote: Option<&str>) -> Result<(), GitError> {
        let remote = remote.unwrap_or("origin");
        self.run(["fetch", remote]).map(|_| ())
    }

    fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run(["checkout", branch]).map(|_| ())
    }

    fn checkout_new(&self, new_branch: &str, base_ref: &str) -> Result<(), GitError> {
        self.run(["checkout", "-b", new_branch, base_ref]).map(|_| ())
    }

    fn create_worktree(
        &self,
        path: &Path,
        branch: &str,
        base_ref: &str,
        existing: bool,
    ) -> Result<(), GitError> {
        let path_str = path.to_string_lossy().into_owned();
        if existing {
            self.run(["worktree", "add", &path_str, branch]).map(|_| ())
        } else {
            self.run(["worktree", "add", "-b", branch, &path_str, base_ref]).map(|_| ())
        }
    }

    fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), GitError> {
        let path_str = path.to_string_lossy().into_owned();
        let mut args = vec!["worktree".to_owned(), "remove".to_owned()];
        if force {
            args.push("--force".to_owned());
        }
        args.push(path_str);
        self.run(args).map(|_| ())
    }

    fn status_porcelain(&self) -> Result<Vec<StatusLine>, GitError> {
        let out = self.run(["status", "--porcelain"])?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|line| {
                if line.len() < 3 {
                    return None;
                }
                let (code, rest) = line.split_at(2);
                Some(StatusLine { code: code.to_owned(), path: rest.trim_start().to_owned() })
            })
            .collect())
    }

    fn is_dirty(&self) -> Result<bool, GitError> {
        Ok(!self.status_porcelain()?.is_empty())
    }

    fn resolve_revision(&self, rev: &str) -> Result<Option<String>, GitError> {
        match self.run(["rev-parse", "--verify", "-q", rev]) {
            Ok(out) => Ok(Some(out.trim().to_owned())),
            Err(GitError::CommandFailed { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let git = CliGit::new(dir.path().to_path_buf());
        git.run(["init", "-q", "-b", "main"]).expect("init");
        git.run(["config", "user.email", "test@example.com"]).expect("config email");
        git.run(["config", "user.name", "Test"]).expect("config name");
        std::fs::write(dir.path().join("README.md"), "hi\n").expect("write");
        git.run(["add", "."]).expect("add");
        git.run(["commit", "-q", "-m", "init"]).expect("commit");
        dir
    }

    #[test]
    fn repo_root_resolves_to_tempdir() {
        let dir = init_repo();
        let git = CliGit::new(dir.path().to_path_buf());
        let root = git.repo_root().expect("repo root");
        assert_eq!(
            root.canonicalize().expect("canon"),
            dir.path().canonicalize().expect("canon")
        );
    }

    #[test]
    fn current_branch_reports_main() {
        let dir = init_repo();
        let git = CliGit::new(dir.path().to_path_buf());
        assert_eq!(git.current_branch().expect("branch"), BranchRef::Name("main".to_owned()));
    }

    #[test]
    fn branch_exists_true_and_false() {
        let dir = init_repo();
        let git = CliGit::new(dir.path().to_path_buf());
        assert!(git.branch_exists("main").expect("exists"));
        assert!(!git.branch_exists("nope").expect("exists"));
    }

    #[test]
    fn checkout_new_then_list_local_branches() {
        let dir = init_repo();
        let git = CliGit::new(dir.path().to_path_buf());
        git.checkout_new("feature/x", "main").expect("checkout -b");
        let branches = git.list_local_branches().expect("branches");
        assert!(branches.contains(&"feature/x".to_owned()));
        assert!(branches.contains(&"main".to_owned()));
    }

    #[test]
    fn is_dirty_reflects_working_tree() {
        let dir = init_repo();
        let git = CliGit::new(dir.path().to_path_buf());
        assert!(!git.is_dirty().expect("clean"));
        std::fs::write(dir.path().join("new.txt"), "x").expect("write");
        assert!(git.is_dirty().expect("dirty"));
    }

    #[test]
    fn resolve_revision_missing_returns_none() {
        let dir = init_repo();
        let git = CliGit::new(dir.path().to_path_buf());
        assert_eq!(git.resolve_revision("does-not-exist").expect("resolve"), None);
    }

    #[test]
    fn resolve_revision_head_returns_some() {
        let dir = init_repo();
        let git = CliGit::new(dir.path().to_path_buf());
        assert!(git.resolve_revision("HEAD").expect("resolve").is_some());
    }

    #[test]
    fn create_and_remove_worktree() {
        let dir = init_repo();
        let git = CliGit::new(dir.path().to_path_buf());
        let wt_dir = tempfile::tempdir().expect("tempdir");
        let wt_path = wt_dir.path().join("wt.1");
        git.create_worktree(&wt_path, "feature/wt", "main", false).expect("create");
        let worktrees = git.list_worktrees().expect("list");
        assert!(worktrees.iter().any(|w| w.path == wt_path.canonicalize().unwrap_or(wt_path.clone())
            || w.path == wt_path));
        git.remove_worktree(&wt_path, false).expect("remove");
    }
}
