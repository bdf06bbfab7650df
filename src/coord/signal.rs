//! Write-once signal files
//!
//! A signal is a marker file inside the coordination directory. Creation
//! with `O_EXCL` makes the false→true transition atomic across processes;
//! existence is the one-bit payload. Signals are monotonic: nothing ever
//! clears one inside a run (the run directory is removed as a whole).

use crate::error::CoordError;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Interval for cross-process signal polling
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A one-shot, cross-process boolean flag
#[derive(Debug, Clone)]
pub struct SignalFile {
    name: &'static str,
    path: PathBuf,
}

impl SignalFile {
    pub fn new(dir: &Path, name: &'static str) -> Self {
        Self {
            name,
            path: dir.join(format!("{name}.signal")),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Raise the signal. Raising an already-set signal is a no-op.
    pub fn set(&self) -> Result<(), CoordError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                debug!(signal = self.name, "Signal set");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(CoordError::SignalFailed {
                name: self.name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Non-blocking probe; safe to call from any process at any rate.
    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    /// Block until the signal is set or the timeout expires.
    ///
    /// Returns whether the signal was observed. Waits in bounded sleep
    /// intervals; with `None` it waits indefinitely.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if self.is_set() {
                return true;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return false;
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}
