//! Worker process pool
//!
//! Launches a fixed set of worker child processes and collects their
//! terminal outcomes. Launch is fan-out: every worker is spawned before
//! any result is awaited, so the client can signal readiness as soon as
//! `launch` returns. Shutdown is cooperative: workers observe the stop
//! signal and exit on their own; the pool joins them and never kills.

use crate::error::WorkerError;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Interval for polling child exit status (std has no timed child wait)
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Terminal result of one worker process
#[derive(Debug)]
pub struct WorkerOutcome {
    pub worker_id: usize,
    pub result: Result<(), WorkerError>,
}

impl WorkerOutcome {
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// The first failed outcome, if any; failure order follows worker id, so
/// re-raising is deterministic.
pub fn first_failure(outcomes: &[WorkerOutcome]) -> Option<&WorkerOutcome> {
    outcomes.iter().find(|o| o.is_failure())
}

struct WorkerHandle {
    id: usize,
    child: Child,
}

/// A fixed-size pool of worker child processes
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Spawn `count` workers through `spawn`. Fan-out: a spawn failure
    /// aborts the launch, but nothing is awaited here.
    pub fn launch<F>(count: usize, mut spawn: F) -> Result<Self, WorkerError>
    where
        F: FnMut(usize) -> std::io::Result<Child>,
    {
        let mut workers = Vec::with_capacity(count);

        for id in 0..count {
            let child = spawn(id).map_err(|e| WorkerError::SpawnFailed {
                id,
                reason: e.to_string(),
            })?;
            debug!(worker = id, pid = child.id(), "Worker process launched");
            workers.push(WorkerHandle { id, child });
        }

        info!(count = workers.len(), "All workers launched");
        Ok(Self { workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Block until every worker has exited and collect the outcomes.
    ///
    /// Consumes the pool - no further submissions. Workers overrunning
    /// `grace` are reported but still joined, never killed: they are
    /// expected to observe the stop signal and leave voluntarily.
    pub fn wait_all(self, grace: Duration) -> Vec<WorkerOutcome> {
        let started = Instant::now();
        self.workers
            .into_iter()
            .map(|handle| wait_worker(handle, started, grace))
            .collect()
    }
}

fn wait_worker(mut handle: WorkerHandle, started: Instant, grace: Duration) -> WorkerOutcome {
    let mut warned = false;

    loop {
        match handle.child.try_wait() {
            Ok(Some(status)) => {
                let result = status_to_result(handle.id, status);
                match &result {
                    Ok(()) => debug!(worker = handle.id, "Worker exited cleanly"),
                    Err(e) => warn!(worker = handle.id, error = %e, "Worker failed"),
                }
                return WorkerOutcome {
                    worker_id: handle.id,
                    result,
                };
            }
            Ok(None) => {
                if !warned && started.elapsed() > grace {
                    warn!(
                        worker = handle.id,
                        grace_secs = grace.as_secs(),
                        "Worker exceeded shutdown grace period, still waiting"
                    );
                    warned = true;
                }
                thread::sleep(WAIT_POLL);
            }
            Err(e) => {
                return WorkerOutcome {
                    worker_id: handle.id,
                    result: Err(WorkerError::WaitFailed {
                        id: handle.id,
                        reason: e.to_string(),
                    }),
                };
            }
        }
    }
}

fn status_to_result(id: usize, status: ExitStatus) -> Result<(), WorkerError> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(WorkerError::Failed { id, code }),
        None => Err(WorkerError::Killed {
            id,
            signal: status.signal().unwrap_or_default(),
        }),
    }
}
