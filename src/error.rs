//! Unified error type for `wtx`'s domain core.
//!
//! Messages are designed to be agent-friendly: each variant states what
//! happened and gives actionable guidance on how to fix it, matching the
//! failure taxonomy in spec §4.6 and §7.

use std::fmt;
use std::path::PathBuf;

/// Unified error type for the domain core (lock, pool, orchestrator,
/// enrichment, update-check, agent-runner).
#[derive(Debug)]
pub enum WtxError {
    /// Not in a Git repository, or `git` is not installed, or `HOME` unset.
    Environment {
        /// Human-readable description of the missing precondition.
        detail: String,
    },

    /// A branch that must not exist already exists (locally or remotely).
    Exists {
        /// The branch name.
        branch: String,
    },

    /// A branch that must exist was not found.
    NotFound {
        /// The branch name.
        branch: String,
    },

    /// A new branch's base ref could not be resolved and no remote exists to
    /// fetch it from.
    InvalidBase {
        /// The base ref that failed to resolve.
        base_ref: String,
    },

    /// A new branch's base ref could not be resolved, but fetching first
    /// might fix it.
    UnresolvedBase {
        /// The base ref that failed to resolve.
        base_ref: String,
    },

    /// Another owner holds the slot's lock.
    Locked {
        /// The slot id that is locked.
        slot_id: String,
        /// The owner identity currently holding the lock.
        owner_id: String,
    },

    /// This process's lock was lost (stolen, released externally, or
    /// overwritten) while it believed it held ownership.
    OwnershipLost {
        /// The slot id whose lock was lost.
        slot_id: String,
    },

    /// `HOME` is unset; all on-disk state is unaddressable.
    HomeUnset,

    /// A lock payload on disk could not be parsed as valid JSON.
    Corrupt {
        /// Path to the corrupt file.
        path: PathBuf,
    },

    /// A Git operation failed.
    Git {
        /// The operation attempted, e.g. `"checkout feature/x"`.
        operation: String,
        /// The underlying error.
        source: wtx_git::GitError,
    },

    /// An external tool (`gh`, the update-check remote) is not on `PATH`.
    ToolMissing {
        /// The tool name.
        tool: String,
    },

    /// An external tool requires re-authentication.
    AuthRequired {
        /// The tool name.
        tool: String,
    },

    /// A transient failure from an external tool (network, rate limit).
    Transient {
        /// Human-readable description.
        detail: String,
    },

    /// A filesystem I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for WtxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment { detail } => {
                write!(
                    f,
                    "environment error: {detail}\n  To fix: run wtx from inside a git repository with git installed and HOME set."
                )
            }
            Self::Exists { branch } => {
                write!(
                    f,
                    "branch '{branch}' already exists.\n  To fix: drop -b to check it out instead, or pick a different name."
                )
            }
            Self::NotFound { branch } => {
                write!(
                    f,
                    "branch '{branch}' not found locally or on any remote.\n  To fix: pass -b to create it, or check the branch name."
                )
            }
            Self::InvalidBase { base_ref } => {
                write!(
                    f,
                    "base ref '{base_ref}' does not resolve and no remote is configured.\n  To fix: fetch the ref manually or pass --from with a ref that exists locally."
                )
            }
            Self::UnresolvedBase { base_ref } => {
                write!(
                    f,
                    "base ref '{base_ref}' does not resolve locally.\n  To fix: retry with --fetch."
                )
            }
            Self::Locked { slot_id, owner_id } => {
                write!(
                    f,
                    "slot {slot_id} is locked by '{owner_id}'.\n  To fix: wait for that session to exit, or force-unlock if you are sure it is stale."
                )
            }
            Self::OwnershipLost { slot_id } => {
                write!(
                    f,
                    "lost ownership of lock for slot {slot_id}.\n  To fix: this is fatal for the running agent; restart it."
                )
            }
            Self::HomeUnset => {
                write!(f, "HOME is not set.\n  To fix: export HOME and retry.")
            }
            Self::Corrupt { path } => {
                write!(
                    f,
                    "corrupt state file: {}\n  To fix: remove the file; wtx will recreate it.",
                    path.display()
                )
            }
            Self::Git { operation, source } => {
                write!(f, "git operation '{operation}' failed: {source}")
            }
            Self::ToolMissing { tool } => {
                write!(f, "{tool} is not installed or not on PATH.\n  To fix: install {tool} and retry.")
            }
            Self::AuthRequired { tool } => {
                write!(f, "{tool} requires re-authentication.\n  To fix: run `{tool} auth login` and retry.")
            }
            Self::Transient { detail } => {
                write!(f, "transient failure: {detail}\n  To fix: retry; this is usually a network blip.")
            }
            Self::Io(err) => {
                write!(f, "I/O error: {err}\n  To fix: check file permissions and disk space.")
            }
        }
    }
}

impl std::error::Error for WtxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Git { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WtxError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
