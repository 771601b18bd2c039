//! The [`GitAccess`] trait — the single abstraction boundary between wtx and git.
//!
//! All domain code in the `wtx` crate interacts with git exclusively through
//! this trait. It is object-safe so callers can hold `&dyn GitAccess` or
//! `Box<dyn GitAccess>` without knowing whether the backend shells out to the
//! `git` binary or talks to an in-process git implementation.

use std::path::Path;

use crate::error::GitError;
use crate::types::{BranchRef, StatusLine, WorktreeEntry};

/// Abstraction over a git working directory.
///
/// Implementations may be backed by the `git` CLI (the only backend shipped
/// here) or by an embedded git implementation; the trait specifies only the
/// operations required, not how they execute.
pub trait GitAccess {
    /// Top-level directory of the current worktree.
    fn repo_root(&self) -> Result<std::path::PathBuf, GitError>;

    /// The repository's shared git directory (resolves linked-worktree
    /// indirection so that every linked worktree of the same repository
    /// reports the same path).
    fn common_dir(&self) -> Result<std::path::PathBuf, GitError>;

    /// The branch `HEAD` currently points at, or `Detached`.
    fn current_branch(&self) -> Result<BranchRef, GitError>;

    /// All worktrees registered with git (main + linked).
    fn list_worktrees(&self) -> Result<Vec<WorktreeEntry>, GitError>;

    /// Local branch names ordered by most recent commit first, truncated to
    /// `limit`.
    fn list_branches_by_recent_commit(&self, limit: usize) -> Result<Vec<String>, GitError>;

    /// All local branch names, unordered.
    fn list_local_branches(&self) -> Result<Vec<String>, GitError>;

    /// `true` if `name` exists as a local branch.
    fn branch_exists(&self, name: &str) -> Result<bool, GitError>;

    /// `true` if `name` exists as a local branch or on any known remote.
    fn branch_exists_local_or_remote(&self, name: &str) -> Result<bool, GitError>;

    /// Names of configured remotes.
    fn list_remotes(&self) -> Result<Vec<String>, GitError>;

    /// Fetch from `remote` (or the default remote when `None`).
    fn fetch(&self, remote: Option<&str>) -> Result<(), GitError>;

    /// Check out an existing branch in the current worktree.
    fn checkout(&self, branch: &str) -> Result<(), GitError>;

    /// Create and check out a new branch from `base_ref`.
    fn checkout_new(&self, new_branch: &str, base_ref: &str) -> Result<(), GitError>;

    /// Create a new linked worktree at `path`.
    ///
    /// When `existing` is `true`, `branch` must already exist and is simply
    /// attached to the new worktree; otherwise a new branch is created from
    /// `base_ref`.
    fn create_worktree(
        &self,
        path: &Path,
        branch: &str,
        base_ref: &str,
        existing: bool,
    ) -> Result<(), GitError>;

    /// Remove a linked worktree. `force` allows removal when the directory
    /// itself is already gone (orphan cleanup).
    fn remove_worktree(&self, path: &Path, force: bool) -> Result<(), GitError>;

    /// Raw `git status --porcelain` lines for the current worktree.
    fn status_porcelain(&self) -> Result<Vec<StatusLine>, GitError>;

    /// `true` if the current worktree has uncommitted changes.
    fn is_dirty(&self) -> Result<bool, GitError>;

    /// Resolve a revision spec to a commit hash.
    ///
    /// Returns `Ok(None)` if the spec does not resolve (callers distinguish
    /// "not found" from transport/tool failures, which are `Err`).
    fn resolve_revision(&self, rev: &str) -> Result<Option<String>, GitError>;
}
