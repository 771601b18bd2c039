//! Spawn an agent in a checked-out slot and keep its lock alive, per §4.9.

use std::path::Path;
use std::process::{Command, ExitStatus};

use crate::error::WtxError;
use crate::lock::{Heartbeat, Lock, LockStore};

/// Runs an agent command to completion inside a slot, holding the lock for
/// the child's lifetime via a heartbeat. Losing the lock does not cancel the
/// child: a stolen lease is a policy decision for the caller, not ours to
/// enforce by killing someone's in-flight work.
pub struct AgentRunner<'a> {
    locks: &'a LockStore,
}

/// Outcome of running an agent to completion.
pub struct AgentRun {
    /// The child's exit status.
    pub status: ExitStatus,
    /// `true` if the heartbeat observed the lease change owner while the
    /// agent was running (e.g. force-unlocked and stolen by another process).
    pub lock_was_lost: bool,
}

impl<'a> AgentRunner<'a> {
    /// Build a runner bound to `locks` for releasing on exit.
    #[must_use]
    pub fn new(locks: &'a LockStore) -> Self {
        Self { locks }
    }

    /// Spawn `command` (first element is the program, rest are args) with
    /// `cwd` as its working directory, inheriting stdio, and rebind `lock`
    /// to the child's pid for the duration of the run.
    pub fn run(&self, command: &[String], cwd: &Path, mut lock: Lock) -> Result<AgentRun, WtxError> {
        let [program, args @ ..] = command else {
            return Err(WtxError::Environment { detail: "agent command is empty".to_owned() });
        };

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .spawn()
            .map_err(|err| WtxError::Environment { detail: format!("failed to launch agent: {err}") })?;

        self.locks.rebind_pid(&mut lock, child.id())?;
        let heartbeat: Heartbeat = self.locks.spawn_heartbeat(&lock);

        let status = child
            .wait()
            .map_err(|err| WtxError::Environment { detail: format!("agent process error: {err}") })?;

        let lock_was_lost = heartbeat.is_lost();
        drop(heartbeat);

        self.locks.release_if_owned(lock.slot_id())?;

        Ok(AgentRun { status, lock_was_lost })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::OwnerIdentity;
    use crate::paths::WtxPaths;

    fn store(tmp: &Path, owner: &str) -> LockStore {
        LockStore::new(WtxPaths::new(tmp.to_path_buf()), OwnerIdentity::literal(owner))
    }

    #[test]
    fn run_releases_lock_and_reports_success() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let locks = store(tmp.path(), "owner-a");
        let lock = locks
            .acquire("slot1", Path::new("/repo"), tmp.path(), Some(std::process::id()))
            .expect("acquire");

        let runner = AgentRunner::new(&locks);
        let run = runner
            .run(&["true".to_owned()], tmp.path(), lock)
            .expect("run");

        assert!(run.status.success());
        assert!(!run.lock_was_lost);
        assert!(locks.is_available("slot1"));
    }

    #[test]
    fn run_surfaces_nonzero_exit_status() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let locks = store(tmp.path(), "owner-a");
        let lock = locks
            .acquire("slot1", Path::new("/repo"), tmp.path(), Some(std::process::id()))
            .expect("acquire");

        let runner = AgentRunner::new(&locks);
        let run = runner
            .run(&["false".to_owned()], tmp.path(), lock)
            .expect("run");

        assert!(!run.status.success());
        assert!(locks.is_available("slot1"));
    }

    #[test]
    fn empty_command_is_rejected_before_spawn() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let locks = store(tmp.path(), "owner-a");
        let lock = locks
            .acquire("slot1", Path::new("/repo"), tmp.path(), Some(std::process::id()))
            .expect("acquire");

        let runner = AgentRunner::new(&locks);
        let result = runner.run(&[], tmp.path(), lock);
        assert!(matches!(result, Err(WtxError::Environment { .. })));
    }
}
