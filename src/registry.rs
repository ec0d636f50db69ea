// src/registry.rs

//! Process registry.
//!
//! Every OS process spawned by the script runner is tracked here until it
//! exits on its own and its output pipes close, or until it is
//! force-terminated by [`ProcessRegistry::clear_all`]. A script that leaves a
//! background child holding its pipes stays tracked after it exits, so a
//! clear can still stop the output capture.
//!
//! The registry never owns the `Child` directly. Each process is owned by a
//! supervisor task (see [`crate::exec`]) that waits for its exit; the
//! registry holds a kill-request channel into that supervisor plus the abort
//! handle of the output-drain task, so a clear stops both the process and
//! any in-flight output capture.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::errors::{HookdeployError, Result};

/// Registry-local identifier of a tracked process.
pub type ProcessId = u64;

/// Channel the supervisor answers a kill request on.
pub type KillReply = oneshot::Sender<std::io::Result<()>>;

/// A live process as seen by the registry.
pub struct TrackedProcess {
    pid: u32,
    command: String,
    kill_tx: oneshot::Sender<KillReply>,
    drain: Option<AbortHandle>,
}

impl TrackedProcess {
    pub fn new(
        pid: u32,
        command: impl Into<String>,
        kill_tx: oneshot::Sender<KillReply>,
        drain: Option<AbortHandle>,
    ) -> Self {
        Self {
            pid,
            command: command.into(),
            kill_tx,
            drain,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Ask the supervisor to kill the process and wait for its answer.
    async fn terminate(self) -> Result<()> {
        if let Some(drain) = &self.drain {
            drain.abort();
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if self.kill_tx.send(reply_tx).is_err() {
            return Err(HookdeployError::SupervisorGone(self.pid));
        }

        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(HookdeployError::Kill {
                pid: self.pid,
                source,
            }),
            Err(_) => Err(HookdeployError::SupervisorGone(self.pid)),
        }
    }
}

impl fmt::Debug for TrackedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedProcess")
            .field("pid", &self.pid)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

/// Thread-safe set of tracked processes.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    next_id: AtomicU64,
    processes: Mutex<HashMap<ProcessId, TrackedProcess>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProcessId, TrackedProcess>> {
        // Entries stay consistent even if a holder panicked.
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking a process. Call right after a successful spawn,
    /// before anything awaits on it.
    pub fn register(&self, process: TrackedProcess) -> ProcessId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, pid = process.pid, command = %process.command, "registering process");
        self.lock().insert(id, process);
        id
    }

    /// Stop tracking a process that exited on its own and whose output has
    /// been fully captured.
    ///
    /// Returns `false` if it was already removed (e.g. by a clear).
    pub fn deregister(&self, id: ProcessId) -> bool {
        let removed = self.lock().remove(&id);
        if let Some(process) = &removed {
            debug!(id, pid = process.pid, "process exited; deregistered");
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// OS pids of all tracked processes, sorted.
    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.lock().values().map(|p| p.pid).collect();
        pids.sort_unstable();
        pids
    }

    /// Forcibly terminate every tracked process.
    ///
    /// The tracked set is snapshotted and emptied atomically; terminations
    /// then run without holding the lock. A failure for one process is
    /// logged and does not stop the others.
    pub async fn clear_all(&self) -> ClearReport {
        let snapshot: Vec<(ProcessId, TrackedProcess)> = self.lock().drain().collect();

        if snapshot.is_empty() {
            debug!("clear requested; no tracked processes");
            return ClearReport::default();
        }

        info!(count = snapshot.len(), "terminating all tracked processes");

        let mut report = ClearReport::default();
        for (id, process) in snapshot {
            let pid = process.pid;
            let command = process.command.clone();
            match process.terminate().await {
                Ok(()) => {
                    report.killed += 1;
                    debug!(id, pid, command = %command, "process killed");
                }
                Err(err) => {
                    warn!(id, pid, command = %command, error = %err, "can't kill process");
                    report.last_error = Some(err);
                }
            }
        }

        report
    }
}

/// What a [`ProcessRegistry::clear_all`] did.
///
/// `last_error` is diagnostic only: every tracked entry has been removed and
/// every reachable process terminated regardless of it.
#[derive(Debug, Default)]
pub struct ClearReport {
    pub killed: usize,
    pub last_error: Option<HookdeployError>,
}
