//! Error type for the git abstraction layer.

use thiserror::Error;

/// Error returned by [`crate::GitAccess`] operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary is not on `PATH`.
    #[error("git is not installed or not on PATH.\n  To fix: install git and retry.")]
    ToolMissing,

    /// A git invocation exited non-zero.
    #[error("git command failed: {command}{}\n  To fix: check repository state and retry.", stderr_clause(stderr))]
    CommandFailed {
        /// The command that was run, e.g. `"git worktree add"`.
        command: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// A revision, branch, or ref could not be resolved.
    #[error("could not resolve '{spec}'.\n  To fix: check the ref or revision exists.")]
    NotFound {
        /// The spec that failed to resolve.
        spec: String,
    },

    /// Filesystem I/O failure underneath a git operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn stderr_clause(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n  stderr: {stderr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_tool_missing() {
        let msg = GitError::ToolMissing.to_string();
        assert!(msg.contains("not installed"));
    }

    #[test]
    fn display_command_failed_with_stderr() {
        let err = GitError::CommandFailed {
            command: "git worktree add".to_owned(),
            stderr: "fatal: already exists".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("git worktree add"));
        assert!(msg.contains("fatal: already exists"));
    }

    #[test]
    fn display_command_failed_empty_stderr() {
        let err = GitError::CommandFailed {
            command: "git fetch".to_owned(),
            stderr: String::new(),
        };
        assert!(!err.to_string().contains("stderr:"));
    }

    #[test]
    fn display_not_found() {
        let err = GitError::NotFound { spec: "origin/main".to_owned() };
        assert!(err.to_string().contains("origin/main"));
    }
}
