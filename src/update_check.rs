//! Throttled remote version probe, per spec §4.8.

use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WtxError;
use crate::paths::{atomic_write, WtxPaths};

/// Bound on the network round-trip for a version check.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(3);
/// Minimum interval between successful remote checks.
pub const THROTTLE: Duration = Duration::from_secs(24 * 60 * 60);
/// Bound on the install step.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

/// A parsed `vMAJOR.MINOR.PATCH` release tag. Pre-release suffixes are not
/// represented; tags carrying one are ignored by the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReleaseVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl ReleaseVersion {
    /// Parse `tag` as `vMAJOR.MINOR.PATCH`, rejecting anything else
    /// (pre-release suffixes, malformed numbers, missing `v` prefix).
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let rest = tag.strip_prefix('v')?;
        let mut parts = rest.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch_str = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        // Pre-release suffix (e.g. "3-rc1") renders the tag unparseable.
        if !patch_str.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let patch = patch_str.parse().ok()?;
        Some(Self { major, minor, patch })
    }

    /// The numerically greatest of `tags` that parses as a release version.
    #[must_use]
    pub fn greatest(tags: &[String]) -> Option<Self> {
        tags.iter().filter_map(|t| Self::parse(t)).max()
    }
}

impl std::fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The current running version: either a tagged release or a dev/pseudo
/// version (anything that does not parse as `vMAJOR.MINOR.PATCH`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CurrentVersion {
    /// A release build, e.g. from a tagged `cargo install`.
    Release(ReleaseVersion),
    /// A dev build (git describe output, `0.0.0-dev`, etc).
    Dev(String),
}

impl CurrentVersion {
    /// Parse a version string as reported by `--version`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let candidate = if raw.starts_with('v') { raw.to_owned() } else { format!("v{raw}") };
        match ReleaseVersion::parse(&candidate) {
            Some(v) => Self::Release(v),
            None => Self::Dev(raw.to_owned()),
        }
    }
}

/// Outcome of comparing the current version against the latest release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateVerdict {
    /// Current is already the latest (or newer).
    UpToDate,
    /// A newer release exists, and the UI should show a notification.
    NotifyUpdate,
    /// A newer release exists for install purposes, but the notification
    /// is suppressed because the current build is a dev/pseudo version.
    SilentUpdate,
}

/// Compare `current` against `latest`, per spec §4.8's release-vs-dev rule.
#[must_use]
pub fn compare(current: &CurrentVersion, latest: ReleaseVersion) -> UpdateVerdict {
    match current {
        CurrentVersion::Release(v) => {
            if latest > *v {
                UpdateVerdict::NotifyUpdate
            } else {
                UpdateVerdict::UpToDate
            }
        }
        CurrentVersion::Dev(_) => UpdateVerdict::SilentUpdate,
    }
}

/// `<home>/.wtx/update-state.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateState {
    /// Unix timestamp of the last successful remote check.
    pub last_checked_unix: i64,
    /// The latest version seen on that check, as a raw tag string.
    pub last_seen_version: Option<String>,
}

impl UpdateState {
    /// Load the throttle state, defaulting to "never checked".
    pub fn load(paths: &WtxPaths) -> Result<Self, WtxError> {
        match std::fs::read(paths.update_state_file()) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|_| WtxError::Corrupt { path: paths.update_state_file() }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically persist the throttle state.
    pub fn save(&self, paths: &WtxPaths) -> Result<(), WtxError> {
        let bytes = serde_json::to_vec(self).expect("UpdateState serialization is infallible");
        atomic_write(&paths.update_state_file(), &bytes)?;
        Ok(())
    }

    /// `true` if the throttle window has elapsed since the last check.
    #[must_use]
    pub fn should_check(&self, now_unix: i64) -> bool {
        now_unix - self.last_checked_unix >= THROTTLE.as_secs() as i64
    }
}

/// Release tags for a project, fetched via `git ls-remote --tags`.
pub fn fetch_release_tags(releases_repo_url: &str) -> Result<Vec<String>, WtxError> {
    let output = Command::new("git")
        .args(["ls-remote", "--tags", releases_repo_url])
        .output()
        .map_err(|err| WtxError::Transient { detail: err.to_string() })?;
    if !output.status.success() {
        return Err(WtxError::Transient { detail: String::from_utf8_lossy(&output.stderr).into_owned() });
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter_map(|line| line.rsplit('/').next())
        .map(|tag| tag.trim_end_matches("^{}").to_owned())
        .collect())
}

/// Whether a checksum/sumdb verification failure is indicated by installer
/// output (platform-specific concession, per spec §4.8 and §9 — elided
/// entirely when the chosen installer has no such concept).
#[must_use]
pub fn looks_like_sumdb_failure(installer_stderr: &str) -> bool {
    let lower = installer_stderr.to_ascii_lowercase();
    lower.contains("checksum mismatch") || lower.contains("sumdb") || lower.contains("gonosumcheck")
}
