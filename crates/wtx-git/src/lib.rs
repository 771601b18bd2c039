//! Git abstraction layer for `wtx`.
//!
//! [`GitAccess`] is the trait boundary: every other `wtx` crate interacts
//! with git exclusively through it. [`CliGit`] is the only implementation
//! shipped here, backed by shelling out to the `git` binary.

mod cli_git;
mod error;
mod repo;
mod types;

pub use cli_git::CliGit;
pub use error::GitError;
pub use repo::GitAccess;
pub use types::{BranchRef, StatusLine, WorktreeEntry};
