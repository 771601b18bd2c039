//! Vocabulary types shared between [`crate::GitAccess`] and its callers.
//!
//! Deliberately thin: no gix/libgit2/CLI types leak out of this module.

use std::fmt;
use std::path::PathBuf;

/// The branch a worktree's `HEAD` points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchRef {
    /// `HEAD` is on a named branch.
    Name(String),
    /// `HEAD` is detached (points directly at a commit).
    Detached,
}

impl BranchRef {
    /// Return the branch name, or `None` if detached.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            Self::Detached => None,
        }
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => f.write_str(n),
            Self::Detached => f.write_str("detached"),
        }
    }
}

/// A single entry from `git worktree list`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorktreeEntry {
    /// Absolute path to the worktree root.
    pub path: PathBuf,
    /// The branch checked out there, or `Detached`.
    pub branch: BranchRef,
}

/// A single `git status --porcelain` line, kept as a raw two-letter-coded entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLine {
    /// The two status-code characters (e.g. `" M"`, `"??"`).
    pub code: String,
    /// Path relative to the repository root.
    pub path: String,
}
