//! Checkout orchestration: resolve a requested branch to a ready slot, per
//! spec §4.6. This is the single most important algorithm in the core.

use std::path::PathBuf;

use crate::error::WtxError;
use crate::identity::{repo_id, slot_id};
use crate::lock::{Lock, LockStore};
use crate::pool::{PoolManager, Slot};
use wtx_git::GitAccess;

/// A checkout request, as produced by the `checkout` CLI subcommand or the
/// interactive picker.
#[derive(Clone, Debug)]
pub struct CheckoutRequest {
    /// The branch to check out.
    pub branch: String,
    /// Whether `branch` is being created fresh.
    pub is_new: bool,
    /// Base ref for a new branch (required when `is_new`).
    pub base_ref: Option<String>,
    /// Whether to fetch before resolving the base ref / creating the slot.
    pub do_fetch: bool,
}

/// A ready-to-use slot: a path, the branch now checked out there, and the
/// held lock. The caller (an agent runner) consumes the lock.
pub struct CheckoutOutcome {
    /// Absolute path to the slot.
    pub slot_path: PathBuf,
    /// The branch now checked out in `slot_path`.
    pub branch: String,
    /// The held lock guarding this slot.
    pub lock: Lock,
}

/// Runs the orchestration algorithm against a [`GitAccess`], [`LockStore`],
/// and [`PoolManager`].
pub struct Orchestrator<'a> {
    git: &'a dyn GitAccess,
    locks: &'a LockStore,
    pool: &'a PoolManager,
}

impl<'a> Orchestrator<'a> {
    /// Build an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(git: &'a dyn GitAccess, locks: &'a LockStore, pool: &'a PoolManager) -> Self {
        Self { git, locks, pool }
    }

    /// Execute the checkout state machine described in spec §4.6.
    pub fn checkout(&self, request: &CheckoutRequest) -> Result<CheckoutOutcome, WtxError> {
        let repo_root = self.git.repo_root().map_err(|source| WtxError::Environment {
            detail: format!("not in a git repository: {source}"),
        })?;
        let common_dir = self.git.common_dir().map_err(|source| WtxError::Environment {
            detail: format!("could not resolve git common directory: {source}"),
        })?;

        self.classify_branch(request)?;
        if request.is_new {
            self.validate_base_ref(request)?;
        }

        let slots = self.pool.enumerate(self.git, self.locks)?;
        let choice = self.select_slot(&slots, request)?;

        match choice {
            SlotChoice::Reuse(slot) => {
                tracing::debug!(branch = %request.branch, slot = %slot.path.display(), "reusing slot already on this branch");
                self.acquire_and_finish(&slot.slot_id, &repo_root, &slot.path, request.branch.clone(), |_| Ok(()))
            }
            SlotChoice::Existing(slot) => {
                tracing::debug!(branch = %request.branch, slot = %slot.path.display(), "repurposing an available slot");
                let branch = request.branch.clone();
                let is_new = request.is_new;
                let base_ref = request.base_ref.clone();
                let do_fetch = request.do_fetch;
                self.acquire_and_finish(&slot.slot_id, &repo_root, &slot.path, branch.clone(), move |git| {
                    if is_new {
                        if do_fetch {
                            git.fetch(None).map_err(|source| WtxError::Git { operation: "fetch".to_owned(), source })?;
                        }
                        let base = base_ref.as_deref().unwrap_or("HEAD");
                        git.checkout_new(&branch, base).map_err(|source| WtxError::Git {
                            operation: format!("checkout -b {branch}"),
                            source,
                        })
                    } else {
                        git.checkout(&branch).map_err(|source| WtxError::Git {
                            operation: format!("checkout {branch}"),
                            source,
                        })
                    }
                })
            }
            SlotChoice::New(path) => {
                let id = slot_id(&common_dir, &path);
                let branch = request.branch.clone();
                let base_ref = request.base_ref.clone().unwrap_or_else(|| "HEAD".to_owned());
                let do_fetch = request.do_fetch;
                let is_new = request.is_new;
                self.acquire_and_finish(&id, &repo_root, &path, branch.clone(), move |git| {
                    if do_fetch {
                        git.fetch(None).map_err(|source| WtxError::Git { operation: "fetch".to_owned(), source })?;
                    }
                    git.create_worktree(&path, &branch, &base_ref, !is_new).map_err(|source| WtxError::Git {
                        operation: format!("worktree add {}", path.display()),
                        source,
                    })
                })
            }
        }
    }

    fn classify_branch(&self, request: &CheckoutRequest) -> Result<(), WtxError> {
        let exists = self.git.branch_exists_local_or_remote(&request.branch).map_err(|source| WtxError::Git {
            operation: format!("check branch {}", request.branch),
            source,
        })?;
        if request.is_new && exists {
            return Err(WtxError::Exists { branch: request.branch.clone() });
        }
        if !request.is_new && !exists {
            return Err(WtxError::NotFound { branch: request.branch.clone() });
        }
        Ok(())
    }

    fn validate_base_ref(&self, request: &CheckoutRequest) -> Result<(), WtxError> {
        let base_ref = request.base_ref.as_deref().unwrap_or("HEAD");
        let resolved = self.git.resolve_revision(base_ref).map_err(|source| WtxError::Git {
            operation: format!("resolve {base_ref}"),
            source,
        })?;
        if resolved.is_some() {
            return Ok(());
        }

        let remotes = self.git.list_remotes().map_err(|source| WtxError::Git { operation: "remote".to_owned(), source })?;
        if remotes.is_empty() {
            return Err(WtxError::InvalidBase { base_ref: base_ref.to_owned() });
        }
        if !request.do_fetch {
            return Err(WtxError::UnresolvedBase { base_ref: base_ref.to_owned() });
        }
        Ok(())
    }

    fn select_slot(&self, slots: &[Slot], request: &CheckoutRequest) -> Result<SlotChoice, WtxError> {
        if let Some(slot) = slots
            .iter()
            .find(|s| s.branch.name() == Some(request.branch.as_str()) && !s.orphaned && s.available)
        {
            return Ok(SlotChoice::Reuse(slot.clone()));
        }

        if let Some(slot) = slots.iter().find(|s| s.available && !s.orphaned) {
            return Ok(SlotChoice::Existing(slot.clone()));
        }

        let repo_root = self.git.repo_root().map_err(|source| WtxError::Environment {
            detail: format!("not in a git repository: {source}"),
        })?;
        let path = self.pool.next_slot_path(&repo_root)?;
        Ok(SlotChoice::New(path))
    }

    fn acquire_and_finish(
        &self,
        slot_id: &str,
        repo_root: &std::path::Path,
        slot_path: &std::path::Path,
        branch: String,
        step: impl FnOnce(&dyn GitAccess) -> Result<(), WtxError>,
    ) -> Result<CheckoutOutcome, WtxError> {
        let lock = self.locks.acquire(slot_id, repo_root, slot_path, None)?;

        if let Err(err) = step(self.git) {
            let _ = self.locks.release(lock);
            return Err(err);
        }

        let common_dir = self.git.common_dir().unwrap_or_else(|_| repo_root.to_path_buf());
        let _ = self.pool.record_recent_branch(&repo_id(&common_dir), &branch);

        Ok(CheckoutOutcome { slot_path: slot_path.to_path_buf(), branch, lock })
    }
}

enum SlotChoice {
    Reuse(Slot),
    Existing(Slot),
    New(PathBuf),
}
