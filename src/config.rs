//! User configuration (`<home>/.wtx/config.json`), per spec §6.

use serde::{Deserialize, Serialize};

use crate::error::WtxError;
use crate::paths::{atomic_write, WtxPaths};

/// User configuration. Missing file is not an error; callers get
/// [`WtxConfig::default`] which has no agent command configured.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WtxConfig {
    /// The command to launch inside a selected slot, e.g. `["claude"]`.
    #[serde(default)]
    pub agent_command: Vec<String>,

    /// Default base ref for new branches when `--from` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_branch_base_ref: Option<String>,

    /// Whether `checkout -b` fetches before resolving the base ref by
    /// default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_branch_fetch_first: Option<bool>,

    /// Command used to open a slot in an IDE from the picker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ide_command: Option<String>,

    /// Maximum number of recent branches shown on the main screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_screen_branch_limit: Option<usize>,

    /// Git remote to probe for release tags during `wtx update`. Update
    /// checks are skipped (not guessed) when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_repo_url: Option<String>,
}

impl WtxConfig {
    /// Load `config.json`, or return the default config if it does not
    /// exist.
    pub fn load(paths: &WtxPaths) -> Result<Self, WtxError> {
        let path = paths.config_file();
        let raw = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&raw).map_err(|_| WtxError::Corrupt { path })
    }

    /// Write `config.json`, pretty-printed for human editability, via an
    /// atomic tempfile+rename.
    pub fn save(&self, paths: &WtxPaths) -> Result<(), WtxError> {
        let json = serde_json::to_vec_pretty(self)
            .expect("WtxConfig serialization is infallible");
        atomic_write(&paths.config_file(), &json)?;
        Ok(())
    }

    /// Effective branch limit for the main screen.
    #[must_use]
    pub fn branch_limit(&self) -> usize {
        self.main_screen_branch_limit.unwrap_or(20)
    }

    /// Effective fetch-first default for new-branch checkouts.
    #[must_use]
    pub fn fetch_first_default(&self) -> bool {
        self.new_branch_fetch_first.unwrap_or(false)
    }
}
