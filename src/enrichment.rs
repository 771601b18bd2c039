//! Background PR/CI/review enrichment, per spec §4.7.
//!
//! Fetches are coalesced by key and run on a plain OS thread (this crate
//! carries no async runtime); completions are applied only if the
//! requesting key is still current when they land, per the stale-response
//! filter in spec §5.

use std::collections::HashMap;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WtxError;
use crate::paths::{atomic_write, WtxPaths};

/// Refresh cadence for PR/CI data while the UI is showing it.
pub const ENRICHMENT_TICK: Duration = Duration::from_secs(5);
/// Refresh cadence for local status (available/dirty/orphaned) polling.
pub const STATUS_TICK: Duration = Duration::from_secs(2);
/// On-disk status-cache TTL consulted by the short-lived statusline child.
pub const STATUS_CACHE_TTL: Duration = Duration::from_secs(10);

/// Derived PR status, in the precedence order spec §4.7 defines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrStatus {
    /// `merged_at` is present.
    Merged,
    /// `state == "closed"` (and not merged).
    Closed,
    /// Mergeable state is dirty (conflicts with base).
    Conflict,
    /// Reviews are required and not all satisfied.
    AwaitingReview,
    /// CI is still running.
    AwaitingCi,
    /// Unresolved comment threads remain and comments are required.
    AwaitingComments,
    /// Every requirement is satisfied.
    CanMerge,
    /// A draft PR with none of the above conditions.
    Draft,
    /// Fallback: none of the above.
    Open,
}

/// CI aggregate state for a PR/branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CiState {
    /// No CI configured or reported.
    #[default]
    None,
    /// Checks are still running.
    InProgress,
    /// All checks passed.
    Success,
    /// At least one check failed.
    Fail,
}

/// The raw facts used to derive [`PrStatus`], decoupled from `gh`'s exact
/// JSON shape so derivation is independently testable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrFacts {
    /// `true` if the PR has a `mergedAt` timestamp.
    pub merged: bool,
    /// `true` if the PR's state is `"CLOSED"`.
    pub closed: bool,
    /// `true` if the PR's mergeable state is dirty (conflicting).
    pub conflicting: bool,
    /// `true` if the PR is a draft.
    pub draft: bool,
    /// CI aggregate state.
    pub ci_state: CiState,
    /// Checks that have finished running.
    pub ci_completed: u32,
    /// Total checks reported.
    pub ci_total: u32,
    /// Names of currently-failing checks.
    pub ci_failing_names: Vec<String>,
    /// Whether review approval is required at all for this repo/branch.
    pub review_required_count: u32,
    /// Number of approvals recorded.
    pub review_approved_count: u32,
    /// Unresolved review comment threads.
    pub unresolved_comments: u32,
    /// `true` if unresolved comments block merging in this repo's policy.
    pub comments_required: bool,
}

/// Per-branch enrichment datum, per spec §3 "PR datum".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrDatum {
    /// PR number.
    pub number: u64,
    /// Web URL for the PR.
    pub url: String,
    /// Derived status label.
    pub status: PrStatus,
    /// CI aggregate state.
    pub ci_state: CiState,
    /// Checks completed so far.
    pub ci_completed: u32,
    /// Total checks expected.
    pub ci_total: u32,
    /// Names of currently-failing checks.
    pub ci_failing_names: Vec<String>,
    /// Approvals recorded.
    pub review_approved: u32,
    /// Approvals required (normalised, see [`normalize_review_required`]).
    pub review_required: u32,
    /// `true` if review requirement data was obtainable.
    pub review_known: bool,
    /// Unresolved review comment threads.
    pub unresolved_comments: u32,
    /// Resolved review comment threads.
    pub resolved_comments: u32,
    /// Total comment threads.
    pub comment_threads_total: u32,
    /// `true` if comment-thread data was obtainable.
    pub comments_known: bool,
    /// `true` if the PR has enough approvals.
    pub approved: bool,
}

/// Normalise `review_required` so it is never less than `review_approved`
/// when there is at least one approval (source-of-truth may underreport
/// the required count once approvals exceed it). Returns `(required, known)`.
#[must_use]
pub fn normalize_review_required(required: u32, approved: u32) -> (u32, bool) {
    if approved > required && approved > 0 {
        (approved, true)
    } else {
        (required, true)
    }
}

/// Derive a [`PrStatus`] from raw facts. Total: every combination yields
/// exactly one label.
#[must_use]
pub fn derive_status(facts: &PrFacts) -> PrStatus {
    if facts.merged {
        return PrStatus::Merged;
    }
    if facts.closed {
        return PrStatus::Closed;
    }
    if facts.conflicting {
        return PrStatus::Conflict;
    }
    let (required, _known) = normalize_review_required(facts.review_required_count, facts.review_approved_count);
    if required > 0 && facts.review_approved_count < required {
        return PrStatus::AwaitingReview;
    }
    if facts.ci_state == CiState::InProgress {
        return PrStatus::AwaitingCi;
    }
    if facts.comments_required && facts.unresolved_comments > 0 {
        return PrStatus::AwaitingComments;
    }
    let ci_ok = !matches!(facts.ci_state, CiState::Fail);
    if ci_ok {
        return PrStatus::CanMerge;
    }
    if facts.draft {
        return PrStatus::Draft;
    }
    PrStatus::Open
}

/// `repo-id + "|" + sorted-branches-joined-by-comma`, per spec §3.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FetchKey(String);

impl FetchKey {
    /// Build a key from a repo id and an unordered branch set.
    #[must_use]
    pub fn new(repo_id: &str, branches: &[String]) -> Self {
        let mut sorted = branches.to_vec();
        sorted.sort();
        Self(format!("{repo_id}|{}", sorted.join(",")))
    }

    /// The raw key string, as stored on disk and in the in-memory cache.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StatusCacheEntry {
    fetched_at_unix: i64,
    summary: PrDatum,
}

/// Classify a `gh`-originated failure into the taxonomy spec §4.7 and §7
/// require: `ToolMissing`, `AuthRequired`, `Transient`.
fn classify_gh_failure(stderr: &str) -> WtxError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("not logged") || lower.contains("auth") {
        WtxError::AuthRequired { tool: "gh".to_owned() }
    } else {
        WtxError::Transient { detail: stderr.to_owned() }
    }
}

fn gh_available() -> bool {
    Command::new("gh").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

/// Fetch PR facts for `branch` via `gh pr view <branch> --json ...`.
/// Returns `Ok(None)` when there is no PR for the branch.
fn fetch_pr_facts_via_gh(branch: &str) -> Result<Option<(u64, String, PrFacts)>, WtxError> {
    if !gh_available() {
        return Err(WtxError::ToolMissing { tool: "gh".to_owned() });
    }

    let output = Command::new("gh")
        .args([
            "pr",
            "view",
            branch,
            "--json",
            "number,url,state,isDraft,mergedAt,mergeable,reviewDecision,reviewRequirement,reviews,statusCheckRollup",
        ])
        .output()
        .map_err(|err| WtxError::Transient { detail: err.to_string() })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_ascii_lowercase().contains("no pull requests found") {
            return Ok(None);
        }
        return Err(classify_gh_failure(&stderr));
    }

    let raw: GhPrView = serde_json::from_slice(&output.stdout)
        .map_err(|err| WtxError::Transient { detail: format!("could not parse gh output: {err}") })?;
    Ok(Some(raw.into_facts()))
}

#[derive(Deserialize)]
struct GhPrView {
    number: u64,
    url: String,
    state: String,
    #[serde(rename = "isDraft")]
    is_draft: bool,
    #[serde(rename = "mergedAt")]
    merged_at: Option<String>,
    mergeable: Option<String>,
    #[serde(rename = "reviewRequirement", default)]
    review_requirement: u32,
    #[serde(default)]
    reviews: Vec<GhReview>,
    #[serde(rename = "statusCheckRollup", default)]
    status_check_rollup: Vec<GhCheck>,
}

#[derive(Deserialize)]
struct GhReview {
    state: String,
}

#[derive(Deserialize)]
struct GhCheck {
    conclusion: Option<String>,
    status: String,
    name: String,
}

impl GhPrView {
    fn into_facts(self) -> (u64, String, PrFacts) {
        let approved = self.reviews.iter().filter(|r| r.state.eq_ignore_ascii_case("approved")).count() as u32;
        let total = self.status_check_rollup.len() as u32;
        let completed = self
            .status_check_rollup
            .iter()
            .filter(|c| c.status.eq_ignore_ascii_case("completed"))
            .count() as u32;
        let failing_names: Vec<String> = self
            .status_check_rollup
            .iter()
            .filter(|c| matches!(c.conclusion.as_deref(), Some("FAILURE" | "failure")))
            .map(|c| c.name.clone())
            .collect();

        let ci_state = if total == 0 {
            CiState::None
        } else if completed < total {
            CiState::InProgress
        } else if !failing_names.is_empty() {
            CiState::Fail
        } else {
            CiState::Success
        };

        let facts = PrFacts {
            merged: self.merged_at.is_some(),
            closed: self.state.eq_ignore_ascii_case("closed") && self.merged_at.is_none(),
            conflicting: self.mergeable.as_deref() == Some("CONFLICTING") || self.mergeable.as_deref() == Some("dirty"),
            draft: self.is_draft,
            ci_state,
            ci_completed: completed,
            ci_total: total,
            ci_failing_names: failing_names,
            review_required_count: self.review_requirement,
            review_approved_count: approved,
            unresolved_comments: 0,
            comments_required: false,
        };
        (self.number, self.url, facts)
    }
}

fn facts_to_datum(number: u64, url: String, facts: PrFacts) -> PrDatum {
    let (review_required, review_known) = normalize_review_required(facts.review_required_count, facts.review_approved_count);
    let status = derive_status(&facts);
    PrDatum {
        number,
        url,
        status,
        ci_state: facts.ci_state,
        ci_completed: facts.ci_completed,
        ci_total: facts.ci_total,
        ci_failing_names: facts.ci_failing_names,
        review_approved: facts.review_approved_count,
        review_required,
        review_known,
        unresolved_comments: facts.unresolved_comments,
        resolved_comments: 0,
        comment_threads_total: facts.unresolved_comments,
        comments_known: false,
        approved: facts.review_approved_count >= review_required && review_required > 0,
    }
}

type BranchMap = HashMap<String, PrDatum>;

/// Coalescing, TTL-cached background fetcher for PR/CI/review data.
pub struct EnrichmentService {
    paths: WtxPaths,
    cache: Arc<Mutex<HashMap<String, BranchMap>>>,
    in_flight_key: Arc<Mutex<Option<String>>>,
}

impl EnrichmentService {
    /// Build a service rooted at `paths`.
    #[must_use]
    pub fn new(paths: WtxPaths) -> Self {
        Self { paths, cache: Arc::new(Mutex::new(HashMap::new())), in_flight_key: Arc::new(Mutex::new(None)) }
    }

    /// Request a refresh for `key`/`branches`. If a fetch for the same key
    /// is already in flight, this call coalesces into it (no new thread is
    /// spawned). Responses for a key that is no longer current when they
    /// land are discarded.
    pub fn request(&self, key: &FetchKey, branches: Vec<String>) {
        {
            let mut in_flight = self.in_flight_key.lock().expect("enrichment lock poisoned");
            if in_flight.as_deref() == Some(key.as_str()) {
                return;
            }
            *in_flight = Some(key.as_str().to_owned());
        }

        let cache = Arc::clone(&self.cache);
        let in_flight_key = Arc::clone(&self.in_flight_key);
        let paths = self.paths.clone();
        let key_str = key.as_str().to_owned();

        std::thread::spawn(move || {
            let mut results = BranchMap::new();
            for branch in &branches {
                match fetch_pr_facts_via_gh(branch) {
                    Ok(Some((number, url, facts))) => {
                        results.insert(branch.clone(), facts_to_datum(number, url, facts));
                    }
                    Ok(None) | Err(_) => {}
                }
            }

            let still_current = in_flight_key.lock().expect("enrichment lock poisoned").as_deref() == Some(key_str.as_str());
            if !still_current {
                return;
            }

            for (branch, datum) in &results {
                let _ = write_status_cache(&paths, &key_str, branch, datum);
            }
            cache.lock().expect("enrichment lock poisoned").insert(key_str, results);
        });
    }

    /// The cached branch map for `key`, if any fetch has completed for it.
    #[must_use]
    pub fn get(&self, key: &FetchKey) -> Option<BranchMap> {
        self.cache.lock().expect("enrichment lock poisoned").get(key.as_str()).cloned()
    }

    /// Clear the in-memory cache and in-flight marker so the next tick
    /// refetches unconditionally.
    pub fn force_refresh(&self) {
        self.cache.lock().expect("enrichment lock poisoned").clear();
        *self.in_flight_key.lock().expect("enrichment lock poisoned") = None;
    }
}

fn status_cache_hash(key: &str, branch: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(b"|");
    hasher.update(branch.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

fn write_status_cache(paths: &WtxPaths, key: &str, branch: &str, datum: &PrDatum) -> Result<(), WtxError> {
    let hash = status_cache_hash(key, branch);
    let entry = StatusCacheEntry {
        fetched_at_unix: time::OffsetDateTime::now_utc().unix_timestamp(),
        summary: datum.clone(),
    };
    let bytes = serde_json::to_vec(&entry).expect("StatusCacheEntry serialization is infallible");
    atomic_write(&paths.status_cache_file(&hash), &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(overrides: impl FnOnce(&mut PrFacts)) -> PrFacts {
        let mut f = PrFacts::default();
        overrides(&mut f);
        f
    }

    #[test]
    fn merged_takes_precedence_over_everything() {
        let f = facts(|f| {
            f.merged = true;
            f.closed = true;
            f.conflicting = true;
        });
        assert_eq!(derive_status(&f), PrStatus::Merged);
    }

    #[test]
    fn closed_beats_conflict_and_ci() {
        let f = facts(|f| {
            f.closed = true;
            f.conflicting = true;
        });
        assert_eq!(derive_status(&f), PrStatus::Closed);
    }

    #[test]
    fn conflict_beats_review_and_ci() {
        let f = facts(|f| {
            f.conflicting = true;
            f.review_required_count = 1;
        });
        assert_eq!(derive_status(&f), PrStatus::Conflict);
    }

    #[test]
    fn awaiting_review_when_required_not_satisfied() {
        let f = facts(|f| {
            f.review_required_count = 2;
            f.review_approved_count = 1;
        });
        assert_eq!(derive_status(&f), PrStatus::AwaitingReview);
    }

    #[test]
    fn awaiting_ci_when_review_satisfied_but_ci_running() {
        let f = facts(|f| {
            f.review_required_count = 1;
            f.review_approved_count = 1;
            f.ci_state = CiState::InProgress;
        });
        assert_eq!(derive_status(&f), PrStatus::AwaitingCi);
    }

    #[test]
    fn awaiting_comments_when_unresolved_and_required() {
        let f = facts(|f| {
            f.comments_required = true;
            f.unresolved_comments = 3;
        });
        assert_eq!(derive_status(&f), PrStatus::AwaitingComments);
    }

    #[test]
    fn can_merge_when_all_requirements_satisfied() {
        let f = facts(|f| {
            f.review_required_count = 1;
            f.review_approved_count = 1;
            f.ci_state = CiState::Success;
        });
        assert_eq!(derive_status(&f), PrStatus::CanMerge);
    }

    #[test]
    fn draft_when_failing_ci_and_nothing_else_matches() {
        let f = facts(|f| {
            f.draft = true;
            f.ci_state = CiState::Fail;
        });
        assert_eq!(derive_status(&f), PrStatus::Draft);
    }

    #[test]
    fn open_is_the_final_fallback() {
        let f = facts(|f| {
            f.ci_state = CiState::Fail;
        });
        assert_eq!(derive_status(&f), PrStatus::Open);
    }

    #[test]
    fn review_required_normalizes_up_to_approved() {
        let (required, known) = normalize_review_required(1, 3);
        assert_eq!(required, 3);
        assert!(known);
    }

    #[test]
    fn review_required_unchanged_when_approved_is_zero() {
        let (required, _known) = normalize_review_required(2, 0);
        assert_eq!(required, 2);
    }

    #[test]
    fn fetch_key_sorts_branches_for_stable_identity() {
        let a = FetchKey::new("repo1", &["b".to_owned(), "a".to_owned()]);
        let b = FetchKey::new("repo1", &["a".to_owned(), "b".to_owned()]);
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn force_refresh_clears_cache_and_in_flight() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let service = EnrichmentService::new(WtxPaths::new(tmp.path().to_path_buf()));
        service.cache.lock().unwrap().insert("k".to_owned(), BranchMap::new());
        *service.in_flight_key.lock().unwrap() = Some("k".to_owned());
        service.force_refresh();
        assert!(service.cache.lock().unwrap().is_empty());
        assert!(service.in_flight_key.lock().unwrap().is_none());
    }

    #[test]
    fn classify_gh_failure_detects_auth() {
        let err = classify_gh_failure("error: not logged into any GitHub hosts");
        assert!(matches!(err, WtxError::AuthRequired { .. }));
    }

    #[test]
    fn classify_gh_failure_falls_back_to_transient() {
        let err = classify_gh_failure("connection reset by peer");
        assert!(matches!(err, WtxError::Transient { .. }));
    }
}
