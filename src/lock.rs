//! Cross-process worktree locking, per spec §4.3.
//!
//! The lock file is the authoritative primitive; nothing here shadows it
//! with an in-process mutex that could desynchronise across processes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::WtxError;
use crate::owner::OwnerIdentity;
use crate::paths::{atomic_write, WtxPaths};

/// How long a lock may go unrefreshed before it is considered abandoned.
pub const STALENESS: Duration = Duration::from_secs(10);

/// Heartbeat tick interval bounds: refresh somewhere in this range.
pub const HEARTBEAT_MIN: Duration = Duration::from_secs(1);
/// See [`HEARTBEAT_MIN`].
pub const HEARTBEAT_MAX: Duration = Duration::from_secs(2);

/// On-disk payload of a lock file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPayload {
    /// Process ID whose liveness owns the lease.
    pub pid: u32,
    /// Stable per-session owner identity string.
    pub owner_id: String,
    /// Path to the worktree this lock guards.
    pub worktree_path: PathBuf,
    /// Path to the repository root.
    pub repo_root: PathBuf,
    /// RFC3339-with-nanoseconds timestamp of the last write.
    pub timestamp: String,
}

fn now_rfc3339_nanos() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_owned())
}

enum LockFileState {
    Missing,
    Corrupt,
    Payload(LockPayload),
}

fn read_lock_file(path: &Path) -> LockFileState {
    match std::fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<LockPayload>(&bytes) {
            Ok(payload) => LockFileState::Payload(payload),
            Err(_) => LockFileState::Corrupt,
        },
        Err(_) => LockFileState::Missing,
    }
}

fn mtime_is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|mtime| {
            SystemTime::now().duration_since(mtime).unwrap_or(Duration::ZERO) > STALENESS
        })
        .unwrap_or(true)
}

/// `true` if a process with id `pid` appears to be alive. Conservative:
/// platforms where we cannot check report `true` (never steal a lock we
/// cannot disprove is live).
fn is_process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{pid}")).exists()
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(true)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        true
    }
}

/// A held lock. Dropping it does not release the lease — callers must call
/// [`LockStore::release`] or [`LockStore::release_if_owned`] explicitly, so
/// that release always happens alongside the last-used stamp write.
#[derive(Debug)]
pub struct Lock {
    slot_id: String,
    path: PathBuf,
    payload: LockPayload,
}

impl Lock {
    /// The slot id this lock guards.
    #[must_use]
    pub fn slot_id(&self) -> &str {
        &self.slot_id
    }

    /// The current payload, reflecting the last successful write.
    #[must_use]
    pub fn payload(&self) -> &LockPayload {
        &self.payload
    }
}

/// Acquire/probe/release/force-unlock/rebind leases on disk, per spec §4.3.
pub struct LockStore {
    paths: WtxPaths,
    owner: OwnerIdentity,
}

impl LockStore {
    /// Create a lock store rooted at `paths`, acting as `owner`.
    #[must_use]
    pub fn new(paths: WtxPaths, owner: OwnerIdentity) -> Self {
        Self { paths, owner }
    }

    /// The owner identity this store acts as.
    #[must_use]
    pub fn owner(&self) -> &OwnerIdentity {
        &self.owner
    }

    fn touch_last_used(&self, slot_id: &str) -> Result<(), WtxError> {
        let path = self.paths.last_used_file(slot_id);
        atomic_write(&path, now_rfc3339_nanos().as_bytes())?;
        Ok(())
    }

    /// Acquire a lease on `slot_id`. `pid` defaults to the current process.
    pub fn acquire(
        &self,
        slot_id: &str,
        repo_root: &Path,
        slot_path: &Path,
        pid: Option<u32>,
    ) -> Result<Lock, WtxError> {
        std::fs::create_dir_all(self.paths.locks_dir())?;
        let lock_path = self.paths.lock_file(slot_id);

        let payload = LockPayload {
            pid: pid.unwrap_or_else(std::process::id),
            owner_id: self.owner.as_str().to_owned(),
            worktree_path: slot_path.to_path_buf(),
            repo_root: repo_root.to_path_buf(),
            timestamp: now_rfc3339_nanos(),
        };
        let bytes = serde_json::to_vec(&payload).expect("LockPayload serialization is infallible");

        match std::fs::OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(mut file) => {
                use std::io::Write as _;
                file.write_all(&bytes)?;
                drop(file);
                self.touch_last_used(slot_id)?;
                return Ok(Lock { slot_id: slot_id.to_owned(), path: lock_path, payload });
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err.into()),
        }

        let locked_by = |owner: String| WtxError::Locked { slot_id: slot_id.to_owned(), owner_id: owner };

        let (owner_differs, pid_alive, existing_owner) = match read_lock_file(&lock_path) {
            LockFileState::Payload(existing) => {
                let differs = existing.owner_id != payload.owner_id;
                let alive = is_process_alive(existing.pid);
                (differs, alive, existing.owner_id)
            }
            LockFileState::Corrupt | LockFileState::Missing => (true, false, "unknown".to_owned()),
        };

        let dead_and_stale = !pid_alive && mtime_is_stale(&lock_path);
        if owner_differs && !dead_and_stale {
            tracing::debug!(slot_id, owner_id = %existing_owner, "lock held by another live owner");
            return Err(locked_by(existing_owner));
        }
        if owner_differs {
            tracing::warn!(slot_id, previous_owner = %existing_owner, "reclaiming stale lock");
        }

        atomic_write(&lock_path, &bytes)?;

        match read_lock_file(&lock_path) {
            LockFileState::Payload(reread) if reread.pid == payload.pid && reread.owner_id == payload.owner_id => {}
            _ => return Err(locked_by("unknown".to_owned())),
        }

        self.touch_last_used(slot_id)?;
        Ok(Lock { slot_id: slot_id.to_owned(), path: lock_path, payload })
    }

    /// `true` iff: the file is missing, or its payload matches the current
    /// owner, or its pid is not alive and its mtime is older than the
    /// staleness threshold.
    #[must_use]
    pub fn is_available(&self, slot_id: &str) -> bool {
        let lock_path = self.paths.lock_file(slot_id);
        match read_lock_file(&lock_path) {
            LockFileState::Missing => true,
            LockFileState::Corrupt => mtime_is_stale(&lock_path),
            LockFileState::Payload(payload) => {
                if payload.owner_id == self.owner.as_str() {
                    return true;
                }
                !is_process_alive(payload.pid) && mtime_is_stale(&lock_path)
            }
        }
    }

    /// Remove the lock file unconditionally. Idempotent.
    pub fn release(&self, lock: Lock) -> Result<(), WtxError> {
        self.touch_last_used(&lock.slot_id)?;
        match std::fs::remove_file(&lock.path) {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    /// Remove the lock file at `slot_id` iff its stored owner matches ours.
    /// Returns `true` if it removed the file.
    pub fn release_if_owned(&self, slot_id: &str) -> Result<bool, WtxError> {
        let lock_path = self.paths.lock_file(slot_id);
        let owns = matches!(
            read_lock_file(&lock_path),
            LockFileState::Payload(ref p) if p.owner_id == self.owner.as_str()
        );
        if owns {
            let _ = std::fs::remove_file(&lock_path);
            self.touch_last_used(slot_id)?;
        }
        Ok(owns)
    }

    /// Remove the lock file at `slot_id` regardless of ownership.
    pub fn force_unlock(&self, slot_id: &str) -> Result<(), WtxError> {
        tracing::info!(slot_id, "force-unlocking slot");
        let lock_path = self.paths.lock_file(slot_id);
        match std::fs::remove_file(&lock_path) {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    /// Rewrite `lock`'s payload to point at `new_pid`. Fails with
    /// [`WtxError::OwnershipLost`] if the on-disk owner no longer matches.
    pub fn rebind_pid(&self, lock: &mut Lock, new_pid: u32) -> Result<(), WtxError> {
        match read_lock_file(&lock.path) {
            LockFileState::Payload(current) if current.owner_id == lock.payload.owner_id => {}
            _ => return Err(WtxError::OwnershipLost { slot_id: lock.slot_id.clone() }),
        }

        let mut new_payload = lock.payload.clone();
        new_payload.pid = new_pid;
        new_payload.timestamp = now_rfc3339_nanos();
        let bytes = serde_json::to_vec(&new_payload).expect("LockPayload serialization is infallible");
        atomic_write(&lock.path, &bytes)?;
        lock.payload = new_payload;
        Ok(())
    }

    /// Start a background heartbeat for `lock`: every tick, rewrite the
    /// file's mtime and re-read the payload. If ownership no longer
    /// matches, [`Heartbeat::is_lost`] becomes `true`.
    #[must_use]
    pub fn spawn_heartbeat(&self, lock: &Lock) -> Heartbeat {
        Heartbeat::spawn(lock.path.clone(), lock.payload.clone())
    }
}

/// A scoped background task that refreshes a lock's mtime while it is held.
/// Stopped (and its thread joined) on drop, so every exit path releases the
/// heartbeat along with the lock.
pub struct Heartbeat {
    stop: Arc<AtomicBool>,
    lost: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Heartbeat {
    fn spawn(path: PathBuf, payload: LockPayload) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let lost = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let lost_clone = Arc::clone(&lost);

        let handle = std::thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                std::thread::sleep(HEARTBEAT_MIN);
                match read_lock_file(&path) {
                    LockFileState::Payload(current)
                        if current.owner_id == payload.owner_id && current.pid == payload.pid =>
                    {
                        let bytes = serde_json::to_vec(&current)
                            .expect("LockPayload serialization is infallible");
                        let _ = atomic_write(&path, &bytes);
                    }
                    _ => {
                        tracing::warn!(path = %path.display(), "lock ownership lost while heartbeat was running");
                        lost_clone.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }
        });

        Self { stop, lost, handle: Some(handle) }
    }

    /// `true` if ownership was lost since the heartbeat started.
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Relaxed)
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(tmp: &std::path::Path, owner: &str) -> LockStore {
        let paths = WtxPaths::new(tmp.to_path_buf());
        LockStore::new(paths, OwnerIdentity::literal(owner))
    }

    #[test]
    fn acquire_then_release_leaves_no_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store(tmp.path(), "owner-a");
        let lock = store.acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(111)).expect("acquire");
        assert!(!store.is_available("slot1"));
        store.release(lock).expect("release");
        assert!(store.is_available("slot1"));
        assert!(!store.paths.lock_file("slot1").exists());
    }

    #[test]
    fn second_owner_blocked_while_first_alive() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store_a = store(tmp.path(), "owner-a");
        let store_b = store(tmp.path(), "owner-b");
        let _lock = store_a
            .acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(std::process::id()))
            .expect("acquire a");
        let result = store_b.acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(std::process::id()));
        assert!(matches!(result, Err(WtxError::Locked { .. })));
    }

    #[test]
    fn stale_lock_with_dead_pid_is_reclaimed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store_a = store(tmp.path(), "owner-a");
        let payload = LockPayload {
            pid: 999_999,
            owner_id: "owner-a".to_owned(),
            worktree_path: PathBuf::from("/repo/wt.1"),
            repo_root: PathBuf::from("/repo"),
            timestamp: now_rfc3339_nanos(),
        };
        let lock_path = store_a.paths.lock_file("slot1");
        std::fs::create_dir_all(lock_path.parent().unwrap()).expect("mkdir");
        std::fs::write(&lock_path, serde_json::to_vec(&payload).unwrap()).expect("write");
        // Backdate mtime past the staleness window.
        let past = std::time::SystemTime::now() - Duration::from_secs(20);
        let file = std::fs::File::open(&lock_path).expect("open");
        file.set_modified(past).expect("set_modified");
        drop(file);

        let store_b = store(tmp.path(), "owner-b");
        let lock = store_b
            .acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(std::process::id()))
            .expect("reclaim stale lock");
        assert_eq!(lock.payload().owner_id, "owner-b");
    }

    #[test]
    fn same_owner_may_reacquire() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store_a = store(tmp.path(), "owner-a");
        let _lock1 = store_a
            .acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(std::process::id()))
            .expect("first acquire");
        let lock2 = store_a.acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(4242));
        assert!(lock2.is_ok());
    }

    #[test]
    fn release_if_owned_noop_for_other_owner() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store_a = store(tmp.path(), "owner-a");
        let store_b = store(tmp.path(), "owner-b");
        let _lock = store_a
            .acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(std::process::id()))
            .expect("acquire");
        let removed = store_b.release_if_owned("slot1").expect("release_if_owned");
        assert!(!removed);
        assert!(!store_a.is_available("slot1"));
    }

    #[test]
    fn force_unlock_removes_regardless_of_owner() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store_a = store(tmp.path(), "owner-a");
        let store_b = store(tmp.path(), "owner-b");
        let _lock = store_a
            .acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(std::process::id()))
            .expect("acquire");
        store_b.force_unlock("slot1").expect("force unlock");
        assert!(store_a.is_available("slot1"));
    }

    #[test]
    fn rebind_pid_updates_payload() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store_a = store(tmp.path(), "owner-a");
        let mut lock = store_a
            .acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(111))
            .expect("acquire");
        store_a.rebind_pid(&mut lock, 222).expect("rebind");
        assert_eq!(lock.payload().pid, 222);
    }

    #[test]
    fn rebind_pid_fails_after_force_unlock_and_steal() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store_a = store(tmp.path(), "owner-a");
        let store_b = store(tmp.path(), "owner-b");
        let mut lock = store_a
            .acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(111))
            .expect("acquire");
        store_b.force_unlock("slot1").expect("force unlock");
        let _stolen = store_b
            .acquire("slot1", Path::new("/repo"), Path::new("/repo/wt.1"), Some(333))
            .expect("steal");
        let result = store_a.rebind_pid(&mut lock, 999);
        assert!(matches!(result, Err(WtxError::OwnershipLost { .. })));
    }
}
