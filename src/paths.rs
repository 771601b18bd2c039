//! On-disk layout under `<home>/.wtx/`, per spec §6.
//!
//! Every other module that touches disk state goes through [`WtxPaths`]
//! rather than building paths ad hoc, so the layout lives in exactly one
//! place.

use std::path::PathBuf;

use crate::error::WtxError;

/// Resolved set of paths under `<home>/.wtx/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WtxPaths {
    root: PathBuf,
}

impl WtxPaths {
    /// Resolve paths from `HOME`. Fails with [`WtxError::HomeUnset`] if the
    /// environment variable is missing or empty.
    pub fn from_env() -> Result<Self, WtxError> {
        Self::from_home_var(std::env::var("HOME").ok())
    }

    fn from_home_var(home: Option<String>) -> Result<Self, WtxError> {
        match home {
            Some(home) if !home.is_empty() => Ok(Self::new(PathBuf::from(home))),
            _ => Err(WtxError::HomeUnset),
        }
    }

    /// Build paths rooted at an explicit home directory (tests pass a
    /// `tempfile::TempDir` path here).
    #[must_use]
    pub fn new(home: PathBuf) -> Self {
        Self { root: home.join(".wtx") }
    }

    /// `<home>/.wtx`
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// `<home>/.wtx/config.json`
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// `<home>/.wtx/locks/`
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// `<home>/.wtx/locks/<slot-id>.lock`
    #[must_use]
    pub fn lock_file(&self, slot_id: &str) -> PathBuf {
        self.locks_dir().join(format!("{slot_id}.lock"))
    }

    /// `<home>/.wtx/last_used/`
    #[must_use]
    pub fn last_used_dir(&self) -> PathBuf {
        self.root.join("last_used")
    }

    /// `<home>/.wtx/last_used/<slot-id>`
    #[must_use]
    pub fn last_used_file(&self, slot_id: &str) -> PathBuf {
        self.last_used_dir().join(slot_id)
    }

    /// `<home>/.wtx/cache/recent_branches/`
    #[must_use]
    pub fn recent_branches_dir(&self) -> PathBuf {
        self.root.join("cache").join("recent_branches")
    }

    /// `<home>/.wtx/cache/recent_branches/<repo-id>.json`
    #[must_use]
    pub fn recent_branches_file(&self, repo_id: &str) -> PathBuf {
        self.recent_branches_dir().join(format!("{repo_id}.json"))
    }

    /// `<home>/.wtx/status-cache/`
    #[must_use]
    pub fn status_cache_dir(&self) -> PathBuf {
        self.root.join("status-cache")
    }

    /// `<home>/.wtx/status-cache/<hash>.json`
    #[must_use]
    pub fn status_cache_file(&self, hash: &str) -> PathBuf {
        self.status_cache_dir().join(format!("{hash}.json"))
    }

    /// `<home>/.wtx/agent-state/`
    #[must_use]
    pub fn agent_state_dir(&self) -> PathBuf {
        self.root.join("agent-state")
    }

    /// `<home>/.wtx/agent-state/<slot-id>.json`
    #[must_use]
    pub fn agent_state_file(&self, slot_id: &str) -> PathBuf {
        self.agent_state_dir().join(format!("{slot_id}.json"))
    }

    /// `<home>/.wtx/completions/_wtx`
    #[must_use]
    pub fn completions_file(&self) -> PathBuf {
        self.root.join("completions").join("_wtx")
    }

    /// `<home>/.wtx/update-state.json`
    #[must_use]
    pub fn update_state_file(&self) -> PathBuf {
        self.root.join("update-state.json")
    }

    /// Create every directory this layout needs. Idempotent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.locks_dir(),
            self.last_used_dir(),
            self.recent_branches_dir(),
            self.status_cache_dir(),
            self.agent_state_dir(),
            self.root.join("completions"),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Atomically write `contents` to `path`: write to a sibling temp file in
/// the same directory, then rename into place. Per spec §4.3 step 2 and
/// §4.8, a crash mid-write must never leave `path` half-written.
pub fn atomic_write(path: &std::path::Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_name = format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("wtx"),
        std::process::id()
    );
    let tmp_path = dir.join(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}
