//! Cross-process locks
//!
//! `LockFile` wraps `flock(2)`: the kernel owns the lock state, so a lock
//! held by a process that dies is released automatically - a crashed
//! worker cannot deadlock the run. `ChurnLock` layers the CLI locking
//! modes on top: `native` uses `LockFile`, `application` uses an `O_EXCL`
//! marker-file protocol, `off` makes every acquisition trivially succeed.

use crate::config::LockingMode;
use crate::error::CoordError;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Retry interval for blocking acquisition of the marker-file lock
const MARKER_RETRY: Duration = Duration::from_millis(2);

/// A kernel advisory lock on a well-known file
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, CoordError> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| CoordError::LockFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Block until the lock is held. The wait happens in the kernel, not
    /// in a spin loop.
    pub fn acquire(&self) -> Result<LockGuard, CoordError> {
        let file = self.open()?;
        match Flock::lock(file, FlockArg::LockExclusive) {
            Ok(flock) => Ok(LockGuard { _flock: flock }),
            Err((_, errno)) => Err(CoordError::LockFailed {
                path: self.path.clone(),
                reason: errno.to_string(),
            }),
        }
    }

    /// Try to take the lock without blocking; `None` means contended.
    pub fn try_acquire(&self) -> Result<Option<LockGuard>, CoordError> {
        let file = self.open()?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => Ok(Some(LockGuard { _flock: flock })),
            Err((_, Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, errno)) => Err(CoordError::LockFailed {
                path: self.path.clone(),
                reason: errno.to_string(),
            }),
        }
    }
}

/// Held lock; unlocks on drop (or when the holding process dies)
pub struct LockGuard {
    _flock: Flock<File>,
}

/// Application-level lock: whoever creates the marker file owns the lock.
///
/// Unlike flock, a process that dies while holding the marker leaves it
/// behind; this mode trades crash-safety for protocol-level locking.
#[derive(Debug, Clone)]
pub struct MarkerLock {
    path: PathBuf,
}

impl MarkerLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn try_acquire(&self) -> Result<Option<MarkerGuard>, CoordError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => Ok(Some(MarkerGuard {
                path: self.path.clone(),
            })),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(CoordError::LockFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn acquire(&self) -> Result<MarkerGuard, CoordError> {
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            thread::sleep(MARKER_RETRY);
        }
    }
}

/// Held marker lock; unlinks the marker on drop
pub struct MarkerGuard {
    path: PathBuf,
}

impl Drop for MarkerGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// The shared lock the churn workload takes around directory listings
/// (blocking) and individual renames (non-blocking), selected by the CLI
/// locking mode.
pub enum ChurnLock {
    Native(LockFile),
    Application(MarkerLock),
    Off,
}

impl ChurnLock {
    pub fn for_mode(mode: LockingMode, dir: &Path) -> Self {
        match mode {
            LockingMode::Native => ChurnLock::Native(LockFile::new(dir.join("churn.lock"))),
            LockingMode::Application => {
                ChurnLock::Application(MarkerLock::new(dir.join("churn.marker")))
            }
            LockingMode::Off => ChurnLock::Off,
        }
    }

    /// Blocking acquisition, used around directory listings.
    pub fn acquire(&self) -> Result<ChurnGuard, CoordError> {
        match self {
            ChurnLock::Native(lock) => Ok(ChurnGuard::Native(lock.acquire()?)),
            ChurnLock::Application(lock) => Ok(ChurnGuard::Application(lock.acquire()?)),
            ChurnLock::Off => Ok(ChurnGuard::Unlocked),
        }
    }

    /// Non-blocking acquisition, used around individual renames. `None`
    /// means contended - the caller skips the entry rather than blocking.
    pub fn try_acquire(&self) -> Result<Option<ChurnGuard>, CoordError> {
        match self {
            ChurnLock::Native(lock) => Ok(lock.try_acquire()?.map(ChurnGuard::Native)),
            ChurnLock::Application(lock) => {
                Ok(lock.try_acquire()?.map(ChurnGuard::Application))
            }
            ChurnLock::Off => Ok(Some(ChurnGuard::Unlocked)),
        }
    }
}

/// Held churn lock in whichever mode is active
pub enum ChurnGuard {
    Native(LockGuard),
    Application(MarkerGuard),
    Unlocked,
}
