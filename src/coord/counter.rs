//! Cross-process shared counter
//!
//! The count of files created so far, shared by every worker process of a
//! client. The value lives in a file; every access - including plain reads
//! - happens under the counter's own `LockFile`, so the check-and-increment
//! in `try_reserve_next` is one atomic unit and readers never observe a
//! torn write.

use crate::coord::lock::LockFile;
use crate::error::CoordError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Process-safe monotonic counter backed by a file
#[derive(Debug, Clone)]
pub struct SharedCounter {
    path: PathBuf,
    lock: LockFile,
}

impl SharedCounter {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("files.count"),
            lock: LockFile::new(dir.join("files.lock")),
        }
    }

    /// Atomically reserve the next sequence number, bounded by `max`.
    ///
    /// Under the single counter lock: read the current value, compare
    /// against `max`, write back the increment. Returns `Some(n)` with the
    /// reserved number (1-based) or `None` once the maximum is reached.
    /// This is the sole gate for the creation phase; callers never read
    /// and increment separately.
    pub fn try_reserve_next(&self, max: u64) -> Result<Option<u64>, CoordError> {
        let _guard = self.lock.acquire()?;

        let current = self.read_raw()?;
        if current >= max {
            return Ok(None);
        }

        let next = current + 1;
        fs::write(&self.path, next.to_string()).map_err(CoordError::Io)?;
        trace!(reserved = next, max, "Reserved file number");
        Ok(Some(next))
    }

    /// Current value, read under the counter lock.
    pub fn value(&self) -> Result<u64, CoordError> {
        let _guard = self.lock.acquire()?;
        self.read_raw()
    }

    fn read_raw(&self) -> Result<u64, CoordError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            // Not yet written means not yet incremented.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CoordError::Io(e)),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }

        trimmed.parse().map_err(|_| CoordError::CounterCorrupt {
            path: self.path.clone(),
            contents: trimmed.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_starts_at_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let counter = SharedCounter::new(tmp.path());
        assert_eq!(counter.value().unwrap(), 0);
    }

    #[test]
    fn test_reserve_sequence_is_dense_and_bounded() {
        let tmp = tempfile::tempdir().unwrap();
        let counter = SharedCounter::new(tmp.path());

        assert_eq!(counter.try_reserve_next(3).unwrap(), Some(1));
        assert_eq!(counter.try_reserve_next(3).unwrap(), Some(2));
        assert_eq!(counter.try_reserve_next(3).unwrap(), Some(3));
        assert_eq!(counter.try_reserve_next(3).unwrap(), None);
        assert_eq!(counter.value().unwrap(), 3);
    }

    #[test]
    fn test_concurrent_reservations_never_collide_or_overshoot() {
        const MAX: u64 = 200;
        const CONTENDERS: usize = 8;

        let tmp = tempfile::tempdir().unwrap();
        let counter = Arc::new(SharedCounter::new(tmp.path()));

        let handles: Vec<_> = (0..CONTENDERS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(n) = counter.try_reserve_next(MAX).unwrap() {
                        got.push(n);
                    }
                    got
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        // Exactly MAX reservations, no duplicates, and the counter landed
        // on the maximum.
        assert_eq!(all.len() as u64, MAX);
        let unique: HashSet<u64> = all.iter().copied().collect();
        assert_eq!(unique.len() as u64, MAX);
        all.sort_unstable();
        assert_eq!(all.first(), Some(&1));
        assert_eq!(all.last(), Some(&MAX));
        assert_eq!(counter.value().unwrap(), MAX);
    }

    #[test]
    fn test_corrupt_counter_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let counter = SharedCounter::new(tmp.path());
        fs::write(tmp.path().join("files.count"), "not-a-number").unwrap();

        assert!(matches!(
            counter.value(),
            Err(CoordError::CounterCorrupt { .. })
        ));
    }
}
