//! Worktree pool management: enumeration, sorting, creation, deletion,
//! and the recent-branch cache, per spec §4.5.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::WtxError;
use crate::identity::slot_id;
use crate::lock::LockStore;
use crate::paths::{atomic_write, WtxPaths};
use wtx_git::{BranchRef, GitAccess};

/// Hard cap on `wt.<n>` candidates scanned before giving up.
const MAX_SLOT_SCAN: u32 = 10_000;

/// A single worktree slot with its derived status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Stable id, per [`crate::identity::slot_id`].
    pub slot_id: String,
    /// Absolute path to the slot directory.
    pub path: PathBuf,
    /// Branch checked out there (or detached).
    pub branch: BranchRef,
    /// Whether the directory still exists on disk.
    pub exists_on_disk: bool,
    /// Whether the slot is not currently leased by a different owner.
    pub available: bool,
    /// Whether the working tree has uncommitted changes.
    pub dirty: bool,
    /// Unix timestamp of the last lock acquisition/release, if any.
    pub last_used_unix: Option<i64>,
    /// Whether Git reports this slot but its directory is gone.
    pub orphaned: bool,
}

/// `<home>/.wtx/cache/recent_branches/<repo-id>.json` payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RecentBranches {
    branches: Vec<String>,
}

const RECENT_BRANCHES_CAP: usize = 40;

/// Enumerates, sorts, creates, and deletes worktree slots, and owns the
/// recent-branch cache. Stateless beyond the on-disk paths it reads and
/// writes; callers supply [`GitAccess`] and [`LockStore`] per call.
pub struct PoolManager {
    paths: WtxPaths,
}

impl PoolManager {
    /// Build a pool manager rooted at `paths`.
    #[must_use]
    pub fn new(paths: WtxPaths) -> Self {
        Self { paths }
    }

    fn last_used_unix(&self, slot_id: &str) -> Option<i64> {
        let contents = std::fs::read_to_string(self.paths.last_used_file(slot_id)).ok()?;
        OffsetDateTime::parse(contents.trim(), &Rfc3339).ok().map(OffsetDateTime::unix_timestamp)
    }

    /// Enumerate every worktree Git knows about, decorated with lock,
    /// dirtiness, last-used, and orphan status.
    pub fn enumerate(&self, git: &dyn GitAccess, locks: &LockStore) -> Result<Vec<Slot>, WtxError> {
        let common_dir = git.common_dir().map_err(|source| WtxError::Git {
            operation: "common-dir".to_owned(),
            source,
        })?;
        let worktrees = git.list_worktrees().map_err(|source| WtxError::Git {
            operation: "worktree list".to_owned(),
            source,
        })?;

        let mut slots = Vec::with_capacity(worktrees.len());
        for entry in worktrees {
            let id = slot_id(&common_dir, &entry.path);
            let exists_on_disk = entry.path.is_dir();
            let orphaned = !exists_on_disk;
            let dirty = if exists_on_disk {
                dirty_status(git, &entry.path)
            } else {
                false
            };
            slots.push(Slot {
                available: locks.is_available(&id),
                last_used_unix: self.last_used_unix(&id),
                slot_id: id,
                path: entry.path,
                branch: entry.branch,
                exists_on_disk,
                dirty,
                orphaned,
            });
        }
        sort_for_display(&mut slots);
        Ok(slots)
    }

    /// Compute the next unused `<parent-of-repo>/<repo-base>.wt/wt.<n>`
    /// candidate path.
    pub fn next_slot_path(&self, repo_root: &Path) -> Result<PathBuf, WtxError> {
        let parent = repo_root.parent().ok_or_else(|| WtxError::Environment {
            detail: format!("repository root {} has no parent directory", repo_root.display()),
        })?;
        let base = repo_root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WtxError::Environment { detail: "repository root has no name".to_owned() })?;
        let wt_dir = parent.join(format!("{base}.wt"));

        for n in 1..=MAX_SLOT_SCAN {
            let candidate = wt_dir.join(format!("wt.{n}"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(WtxError::Environment {
            detail: format!("exhausted {MAX_SLOT_SCAN} candidate worktree slots under {}", wt_dir.display()),
        })
    }

    /// Create a new slot at `path`, either attaching `branch` (when
    /// `existing` is `true`) or creating it fresh from `base_ref`.
    pub fn create_slot(
        &self,
        git: &dyn GitAccess,
        path: &Path,
        branch: &str,
        base_ref: &str,
        existing: bool,
    ) -> Result<(), WtxError> {
        git.create_worktree(path, branch, base_ref, existing).map_err(|source| WtxError::Git {
            operation: format!("worktree add {}", path.display()),
            source,
        })
    }

    /// Remove a slot, after validating it is a managed, non-root,
    /// non-last, unlocked slot (or `force` for an orphan's already-gone
    /// directory).
    pub fn delete_slot(
        &self,
        git: &dyn GitAccess,
        locks: &LockStore,
        slot: &Slot,
        repo_root: &Path,
        total_slots: usize,
        force: bool,
    ) -> Result<(), WtxError> {
        if slot.path == repo_root {
            return Err(WtxError::Environment {
                detail: "refusing to delete the repository's primary worktree".to_owned(),
            });
        }
        if !is_managed_leaf(&slot.path) {
            return Err(WtxError::Environment {
                detail: format!("{} is not a wtx-managed slot", slot.path.display()),
            });
        }
        if total_slots <= 1 {
            return Err(WtxError::Environment {
                detail: "refusing to delete the last remaining slot".to_owned(),
            });
        }
        if !slot.available {
            return Err(WtxError::Locked { slot_id: slot.slot_id.clone(), owner_id: "unknown".to_owned() });
        }
        if !slot.exists_on_disk && !force {
            return Err(WtxError::Environment {
                detail: format!("{} no longer exists on disk; retry with force to clean up", slot.path.display()),
            });
        }

        git.remove_worktree(&slot.path, force).map_err(|source| WtxError::Git {
            operation: format!("worktree remove {}", slot.path.display()),
            source,
        })?;
        locks.force_unlock(&slot.slot_id)?;
        let _ = std::fs::remove_file(self.paths.last_used_file(&slot.slot_id));
        Ok(())
    }

    /// Prepend `branch` to the repo's recent-branch cache, deduplicating
    /// and capping at 40 entries.
    pub fn record_recent_branch(&self, repo_id: &str, branch: &str) -> Result<(), WtxError> {
        let path = self.paths.recent_branches_file(repo_id);
        let mut cache: RecentBranches = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();

        cache.branches.retain(|b| b != branch);
        cache.branches.insert(0, branch.to_owned());
        cache.branches.truncate(RECENT_BRANCHES_CAP);

        let bytes = serde_json::to_vec(&cache).expect("RecentBranches serialization is infallible");
        atomic_write(&path, &bytes)?;
        Ok(())
    }

    /// Read the repo's recent-branch cache, most-recent first.
    pub fn recent_branches(&self, repo_id: &str) -> Vec<String> {
        std::fs::read(self.paths.recent_branches_file(repo_id))
            .ok()
            .and_then(|bytes| serde_json::from_slice::<RecentBranches>(&bytes).ok())
            .map(|c| c.branches)
            .unwrap_or_default()
    }
}

fn dirty_status(git: &dyn GitAccess, _path: &Path) -> bool {
    git.is_dirty().unwrap_or(false)
}

/// Leaf matches `wt.<digits>` under a parent directory named `<repo>.wt`.
fn is_managed_leaf(path: &Path) -> bool {
    let leaf_digits = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|l| l.strip_prefix("wt."));
    let has_digit_leaf = matches!(leaf_digits, Some(d) if !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()));
    let parent_ok = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .is_some_and(|p| p.ends_with(".wt"));
    has_digit_leaf && parent_ok
}

/// Sort per the display contract: free-and-not-orphaned first; among free,
/// descending by last-used; ties broken by branch name descending. Orphans
/// and locked slots sort after.
fn sort_for_display(slots: &mut [Slot]) {
    slots.sort_by(|a, b| {
        let category = |s: &Slot| u8::from(!(s.available && !s.orphaned));
        category(a).cmp(&category(b)).then_with(|| {
            b.last_used_unix.unwrap_or(i64::MIN).cmp(&a.last_used_unix.unwrap_or(i64::MIN))
        }).then_with(|| b.branch.to_string().cmp(&a.branch.to_string()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: &str, branch: &str, available: bool, orphaned: bool, last_used: Option<i64>) -> Slot {
        Slot {
            slot_id: id.to_owned(),
            path: PathBuf::from(format!("/repo.wt/{id}")),
            branch: BranchRef::Name(branch.to_owned()),
            exists_on_disk: !orphaned,
            available,
            dirty: false,
            last_used_unix: last_used,
            orphaned,
        }
    }

    #[test]
    fn sort_places_free_slots_before_locked_and_orphaned() {
        let mut slots = vec![
            slot("locked", "feature/a", false, false, Some(100)),
            slot("free", "feature/b", true, false, Some(50)),
            slot("orphan", "feature/c", true, true, Some(200)),
        ];
        sort_for_display(&mut slots);
        assert_eq!(slots[0].slot_id, "free");
        assert!(slots[1].slot_id == "locked" || slots[1].slot_id == "orphan");
    }

    #[test]
    fn sort_among_free_is_descending_last_used() {
        let mut slots = vec![
            slot("old", "feature/a", true, false, Some(10)),
            slot("new", "feature/b", true, false, Some(200)),
        ];
        sort_for_display(&mut slots);
        assert_eq!(slots[0].slot_id, "new");
        assert_eq!(slots[1].slot_id, "old");
    }

    #[test]
    fn sort_ties_broken_by_branch_name_descending() {
        let mut slots = vec![
            slot("a", "alpha", true, false, Some(10)),
            slot("z", "zeta", true, false, Some(10)),
        ];
        sort_for_display(&mut slots);
        assert_eq!(slots[0].slot_id, "z");
        assert_eq!(slots[1].slot_id, "a");
    }

    #[test]
    fn managed_leaf_recognizes_wt_dot_n() {
        assert!(is_managed_leaf(Path::new("/home/me/proj.wt/wt.3")));
        assert!(!is_managed_leaf(Path::new("/home/me/proj.wt/scratch")));
        assert!(!is_managed_leaf(Path::new("/home/me/proj/wt.3")));
        assert!(!is_managed_leaf(Path::new("/home/me/proj.wt/wt.")));
    }

    #[test]
    fn next_slot_path_finds_first_free_n() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo_root = tmp.path().join("myrepo");
        std::fs::create_dir_all(&repo_root).expect("mkdir repo");
        let wt_dir = tmp.path().join("myrepo.wt");
        std::fs::create_dir_all(wt_dir.join("wt.1")).expect("mkdir wt.1");
        std::fs::create_dir_all(wt_dir.join("wt.2")).expect("mkdir wt.2");

        let pool = PoolManager::new(WtxPaths::new(tmp.path().to_path_buf()));
        let candidate = pool.next_slot_path(&repo_root).expect("candidate");
        assert_eq!(candidate, wt_dir.join("wt.3"));
    }

    #[test]
    fn recent_branch_cache_dedupes_and_caps() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pool = PoolManager::new(WtxPaths::new(tmp.path().to_path_buf()));
        pool.record_recent_branch("repo1", "main").expect("record");
        pool.record_recent_branch("repo1", "feature/x").expect("record");
        pool.record_recent_branch("repo1", "main").expect("record re-visit");

        let branches = pool.recent_branches("repo1");
        assert_eq!(branches, vec!["main".to_owned(), "feature/x".to_owned()]);
    }

    #[test]
    fn recent_branch_cache_caps_at_forty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pool = PoolManager::new(WtxPaths::new(tmp.path().to_path_buf()));
        for i in 0..50 {
            pool.record_recent_branch("repo1", &format!("branch-{i}")).expect("record");
        }
        let branches = pool.recent_branches("repo1");
        assert_eq!(branches.len(), RECENT_BRANCHES_CAP);
        assert_eq!(branches[0], "branch-49");
    }
}
