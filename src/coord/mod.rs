//! Cross-process coordination
//!
//! The client, the controller process, and every worker process rendezvous
//! through a run-scoped *coordination directory* on the local filesystem:
//!
//! ```text
//! <base_workdir>/run-<pid>/
//!   ready.signal    client readiness (set once all workers are launched)
//!   halt.signal     stop request from client/workers to the controller
//!   stop.signal     the stop signal (set only by the controller)
//!   files.count     shared file counter value
//!   files.lock      flock guarding every counter access
//!   churn.lock      shared churn lock (native mode)
//!   churn.marker    shared churn lock (application mode)
//! ```
//!
//! Signals are write-once marker files; locks are kernel advisory locks,
//! released automatically if the holder dies. Children receive the
//! directory path on their command line.

mod counter;
mod lock;
mod signal;

pub use counter::SharedCounter;
pub use lock::{ChurnGuard, ChurnLock, LockFile, LockGuard, MarkerGuard, MarkerLock};
pub use signal::SignalFile;

use crate::config::LockingMode;
use crate::error::CoordError;
use std::fs;
use std::path::{Path, PathBuf};

/// Handle on one run's coordination directory
#[derive(Debug, Clone)]
pub struct SyncDir {
    root: PathBuf,
}

impl SyncDir {
    /// Create the directory for a new run (client side).
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, CoordError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CoordError::DirUnusable {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { root })
    }

    /// Open an existing directory (worker/controller side).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CoordError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CoordError::DirUnusable {
                path: root,
                reason: "not a directory".to_string(),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Client readiness: all workers launched.
    pub fn ready(&self) -> SignalFile {
        SignalFile::new(&self.root, "ready")
    }

    /// Stop request towards the controller; only its `Stopping` transition
    /// turns this into the actual stop signal.
    pub fn halt(&self) -> SignalFile {
        SignalFile::new(&self.root, "halt")
    }

    /// The stop signal workers poll. Set exclusively by the controller.
    pub fn stop(&self) -> SignalFile {
        SignalFile::new(&self.root, "stop")
    }

    /// The shared file counter.
    pub fn counter(&self) -> SharedCounter {
        SharedCounter::new(&self.root)
    }

    /// The shared churn lock in the requested mode.
    pub fn churn_lock(&self, mode: LockingMode) -> ChurnLock {
        ChurnLock::for_mode(mode, &self.root)
    }

    /// Remove the run's coordination state (client teardown).
    pub fn cleanup(self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_open() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("run-1");

        let created = SyncDir::create(&root).unwrap();
        let opened = SyncDir::open(&root).unwrap();
        assert_eq!(created.root(), opened.root());
    }

    #[test]
    fn test_open_missing_dir_fails() {
        assert!(SyncDir::open("/nonexistent/run-1").is_err());
    }

    #[test]
    fn test_signals_are_shared_between_handles() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("run-1");

        let client = SyncDir::create(&root).unwrap();
        let worker = SyncDir::open(&root).unwrap();

        assert!(!worker.stop().is_set());
        client.stop().set().unwrap();
        assert!(worker.stop().is_set());

        // Distinct signals do not bleed into each other.
        assert!(!worker.ready().is_set());
        assert!(!worker.halt().is_set());
    }

    #[test]
    fn test_counter_is_shared_between_handles() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("run-1");

        let a = SyncDir::create(&root).unwrap();
        let b = SyncDir::open(&root).unwrap();

        assert_eq!(a.counter().try_reserve_next(10).unwrap(), Some(1));
        assert_eq!(b.counter().try_reserve_next(10).unwrap(), Some(2));
        assert_eq!(a.counter().value().unwrap(), 2);
    }

    #[test]
    fn test_cleanup_removes_state() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("run-1");

        let dir = SyncDir::create(&root).unwrap();
        dir.stop().set().unwrap();
        dir.cleanup();
        assert!(!root.exists());
    }
}
