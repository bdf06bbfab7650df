//! File churn workload
//!
//! Two phases, run by every worker process against the shared set of churn
//! directories (one per mount point, all showing the same remote export):
//!
//! - **Creation phase**: bounded by the shared counter. Each reservation
//!   produces exactly one empty file whose name encodes the worker and the
//!   reserved sequence number, so names are globally unique without any
//!   further coordination. Load here is individually owned.
//!
//! - **Toggle phase**: perpetual. Every worker walks every directory and
//!   flips each workload file between its created-tag and moved-tag name.
//!   Load here is contended by design - workers race on the same names,
//!   and a rename that loses the race is an expected event, not a failure.
//!
//! The stop signal is polled at iteration boundaries only; a rename is
//! never abandoned midway.

use crate::config::WorkerArgs;
use crate::coord::{ChurnLock, SharedCounter, SignalFile, SyncDir};
use crate::error::Result;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Tag a file carries from the moment the creation phase makes it
pub const CREATED_TAG: &str = "created";

/// Tag substituted in by the toggle phase
pub const MOVED_TAG: &str = "moved";

/// Workload parameters for one worker process
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Worker identifier within the client, embedded in file names
    pub worker_id: usize,
    /// Upper bound on the shared file counter
    pub max_files: u64,
    /// Churn directories, one per mount point
    pub dirs: Vec<PathBuf>,
}

impl WorkerSpec {
    pub fn from_args(args: &WorkerArgs) -> Self {
        Self {
            worker_id: args.worker_id,
            max_files: args.max_files,
            dirs: args.dirs.clone(),
        }
    }
}

/// Deterministic workload file name for a reservation.
///
/// Unique across all workers: the sequence number alone never repeats, and
/// the worker id is embedded on top of that.
pub fn file_name(worker_id: usize, seq: u64) -> String {
    format!("file_created_client_#{worker_id}_file_number_#{seq}")
}

/// Compute the toggled counterpart of a workload file name.
///
/// Created-tag names toggle to the moved tag and back; names carrying
/// neither tag are not part of the workload and yield `None`. Applying the
/// toggle twice returns the original name.
pub fn toggle_name(name: &str) -> Option<String> {
    if name.contains(CREATED_TAG) {
        Some(name.replace(CREATED_TAG, MOVED_TAG))
    } else if name.contains(MOVED_TAG) {
        Some(name.replace(MOVED_TAG, CREATED_TAG))
    } else {
        None
    }
}

/// Bounded creation phase.
///
/// Loops on `try_reserve_next` until the shared maximum is reached (or the
/// stop signal fires early). Each successful reservation creates exactly
/// one empty file; the target directory is picked from the reservation
/// number so the files spread across all mounts deterministically.
/// Returns how many files this worker created.
pub fn creation_phase(
    spec: &WorkerSpec,
    counter: &SharedCounter,
    stop: &SignalFile,
) -> Result<u64> {
    let mut created = 0u64;

    loop {
        if stop.is_set() {
            debug!(worker = spec.worker_id, "Stop observed during creation phase");
            break;
        }

        let Some(seq) = counter.try_reserve_next(spec.max_files)? else {
            break;
        };

        let dir = &spec.dirs[(seq as usize - 1) % spec.dirs.len()];
        let name = file_name(spec.worker_id, seq);
        let path = dir.join(&name);

        // Creation failure is fatal to this worker: the reservation is
        // already spent and the quota would silently come up short.
        File::create(&path)?;
        created += 1;
        trace!(worker = spec.worker_id, file = %name, dir = %dir.display(), "Created file");
    }

    Ok(created)
}

/// One full toggle pass over every churn directory.
///
/// The listing is snapshotted under the blocking shared lock; each rename
/// takes the same lock non-blockingly and skips the entry on contention.
/// Listing and rename failures are tolerated - entries vanish whenever
/// another worker wins a rename race.
pub fn toggle_pass(spec: &WorkerSpec, lock: &ChurnLock) -> Result<()> {
    for dir in &spec.dirs {
        let names = snapshot_dir(dir, lock)?;

        for name in names {
            let Some(new_name) = toggle_name(&name) else {
                continue;
            };

            match lock.try_acquire()? {
                Some(_guard) => {
                    match fs::rename(dir.join(&name), dir.join(&new_name)) {
                        Ok(()) => {
                            trace!(worker = spec.worker_id, from = %name, to = %new_name, "Renamed")
                        }
                        Err(e) => {
                            debug!(worker = spec.worker_id, file = %name, error = %e, "Rename lost a race")
                        }
                    }
                }
                None => {
                    trace!(worker = spec.worker_id, file = %name, "Churn lock contended, skipping entry")
                }
            }
        }
    }

    Ok(())
}

/// Perpetual toggle phase; exits only on the stop signal.
pub fn toggle_phase(spec: &WorkerSpec, lock: &ChurnLock, stop: &SignalFile) -> Result<()> {
    while !stop.is_set() {
        toggle_pass(spec, lock)?;
    }
    debug!(worker = spec.worker_id, "Stop observed, leaving toggle phase");
    Ok(())
}

/// Snapshot a directory's entry names under the blocking shared lock.
fn snapshot_dir(dir: &Path, lock: &ChurnLock) -> Result<Vec<String>> {
    let _guard = lock.acquire()?;

    match fs::read_dir(dir) {
        Ok(entries) => Ok(entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect()),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Directory listing failed, continuing");
            Ok(Vec::new())
        }
    }
}

/// Entry point for the worker run mode: creation phase, then toggling
/// until the controller raises the stop signal.
pub fn run_worker(args: &WorkerArgs) -> Result<()> {
    let sync = SyncDir::open(&args.coord_dir)?;
    let counter = sync.counter();
    let stop = sync.stop();
    let lock = sync.churn_lock(args.locking);
    let spec = WorkerSpec::from_args(args);

    info!(
        worker = spec.worker_id,
        dirs = spec.dirs.len(),
        max_files = spec.max_files,
        locking = %args.locking,
        "Worker starting"
    );

    let created = creation_phase(&spec, &counter, &stop)?;
    info!(worker = spec.worker_id, created, "Creation phase finished");

    toggle_phase(&spec, &lock, &stop)?;

    info!(worker = spec.worker_id, "Worker exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockingMode;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn spec(worker_id: usize, max_files: u64, dirs: Vec<PathBuf>) -> WorkerSpec {
        WorkerSpec {
            worker_id,
            max_files,
            dirs,
        }
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            file_name(3, 17),
            "file_created_client_#3_file_number_#17"
        );
    }

    #[test]
    fn test_toggle_name_round_trip() {
        let original = file_name(0, 1);
        let moved = toggle_name(&original).unwrap();
        assert_eq!(moved, "file_moved_client_#0_file_number_#1");
        assert_eq!(toggle_name(&moved).unwrap(), original);
    }

    #[test]
    fn test_toggle_name_ignores_foreign_files() {
        assert!(toggle_name(".snapshot").is_none());
        assert!(toggle_name("unrelated.txt").is_none());
    }

    #[test]
    fn test_creation_phase_fills_exact_quota() {
        let coord = tempfile::tempdir().unwrap();
        let churn = tempfile::tempdir().unwrap();
        let counter = SharedCounter::new(coord.path());
        let stop = SignalFile::new(coord.path(), "stop");

        let spec = spec(0, 5, vec![churn.path().to_path_buf()]);
        let created = creation_phase(&spec, &counter, &stop).unwrap();

        assert_eq!(created, 5);
        assert_eq!(counter.value().unwrap(), 5);
        assert_eq!(fs::read_dir(churn.path()).unwrap().count(), 5);
    }

    #[test]
    fn test_creation_phase_three_workers_share_the_quota() {
        const MAX: u64 = 5;

        let coord = tempfile::tempdir().unwrap();
        let churn = tempfile::tempdir().unwrap();
        let counter = Arc::new(SharedCounter::new(coord.path()));
        let stop = SignalFile::new(coord.path(), "stop");

        let handles: Vec<_> = (0..3)
            .map(|id| {
                let counter = Arc::clone(&counter);
                let stop = stop.clone();
                let spec = spec(id, MAX, vec![churn.path().to_path_buf()]);
                thread::spawn(move || creation_phase(&spec, &counter, &stop).unwrap())
            })
            .collect();

        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // Exactly MAX files exist, with MAX unique names, and the counter
        // stopped at the maximum.
        assert_eq!(total, MAX);
        let names: HashSet<String> = fs::read_dir(churn.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len() as u64, MAX);
        assert_eq!(counter.value().unwrap(), MAX);
    }

    #[test]
    fn test_creation_phase_respects_stop() {
        let coord = tempfile::tempdir().unwrap();
        let churn = tempfile::tempdir().unwrap();
        let counter = SharedCounter::new(coord.path());
        let stop = SignalFile::new(coord.path(), "stop");
        stop.set().unwrap();

        let spec = spec(0, 100, vec![churn.path().to_path_buf()]);
        assert_eq!(creation_phase(&spec, &counter, &stop).unwrap(), 0);
        assert_eq!(counter.value().unwrap(), 0);
    }

    #[test]
    fn test_creation_spreads_across_directories() {
        let coord = tempfile::tempdir().unwrap();
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let counter = SharedCounter::new(coord.path());
        let stop = SignalFile::new(coord.path(), "stop");

        let spec = spec(
            0,
            4,
            vec![a.path().to_path_buf(), b.path().to_path_buf()],
        );
        creation_phase(&spec, &counter, &stop).unwrap();

        assert_eq!(fs::read_dir(a.path()).unwrap().count(), 2);
        assert_eq!(fs::read_dir(b.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_toggle_pass_swaps_tags() {
        let coord = tempfile::tempdir().unwrap();
        let churn = tempfile::tempdir().unwrap();
        let lock = ChurnLock::for_mode(LockingMode::Native, coord.path());

        let created = file_name(0, 1);
        let moved = toggle_name(&file_name(0, 2)).unwrap();
        File::create(churn.path().join(&created)).unwrap();
        File::create(churn.path().join(&moved)).unwrap();
        File::create(churn.path().join("bystander.txt")).unwrap();

        let spec = spec(0, 2, vec![churn.path().to_path_buf()]);
        toggle_pass(&spec, &lock).unwrap();

        let names: HashSet<String> = fs::read_dir(churn.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();

        // Each workload file flipped once; the bystander was left alone.
        assert!(names.contains(&toggle_name(&created).unwrap()));
        assert!(names.contains(&toggle_name(&moved).unwrap()));
        assert!(names.contains("bystander.txt"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_toggle_pass_tolerates_vanished_entries() {
        let coord = tempfile::tempdir().unwrap();
        let churn = tempfile::tempdir().unwrap();
        let lock = ChurnLock::for_mode(LockingMode::Off, coord.path());

        // A name in the snapshot whose file no longer exists models a
        // concurrent worker winning the rename race.
        let name = file_name(0, 1);
        File::create(churn.path().join(&name)).unwrap();
        fs::remove_file(churn.path().join(&name)).unwrap();

        let spec = spec(0, 1, vec![churn.path().to_path_buf()]);
        toggle_pass(&spec, &lock).unwrap();
    }

    #[test]
    fn test_toggle_phase_exits_on_stop() {
        let coord = tempfile::tempdir().unwrap();
        let churn = tempfile::tempdir().unwrap();
        let lock = ChurnLock::for_mode(LockingMode::Native, coord.path());
        let stop = SignalFile::new(coord.path(), "stop");
        stop.set().unwrap();

        let spec = spec(0, 1, vec![churn.path().to_path_buf()]);
        toggle_phase(&spec, &lock, &stop).unwrap();
    }

    #[test]
    fn test_toggle_pass_missing_directory_is_tolerated() {
        let coord = tempfile::tempdir().unwrap();
        let lock = ChurnLock::for_mode(LockingMode::Native, coord.path());

        let spec = spec(0, 1, vec![PathBuf::from("/nonexistent/churn")]);
        toggle_pass(&spec, &lock).unwrap();
    }
}
