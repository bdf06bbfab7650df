//! Error types for vfs-stress
//!
//! One top-level error enum per the usual layering: library code returns
//! structured `thiserror` variants, the binary edge formats them with
//! `anyhow`. Recoverable conditions (VIP fallback, rename races, missing
//! names file) are handled where they occur and never appear here.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the vfs-stress client
#[derive(Error, Debug)]
pub enum StressError {
    /// Mount orchestration errors
    #[error("Mount error: {0}")]
    Mount(#[from] MountError),

    /// Cross-process coordination errors
    #[error("Coordination error: {0}")]
    Coord(#[from] CoordError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External command errors
    #[error("Shell error: {0}")]
    Shell(#[from] ShellError),

    /// Worker process errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Controller errors
    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mount orchestration errors
#[derive(Error, Debug)]
pub enum MountError {
    /// The mount command itself failed; fatal to the client
    #[error("Failed to mount '{address}:{export}' at '{mount_point}': {reason}")]
    MountFailed {
        address: String,
        export: String,
        mount_point: PathBuf,
        reason: String,
    },

    /// Could not create the local mount point directory
    #[error("Failed to create mount point '{path}': {reason}")]
    MountPointUnusable { path: PathBuf, reason: String },

    /// Mount command exceeded its timeout
    #[error("Mount of '{address}' timed out after {secs}s")]
    Timeout { address: String, secs: u64 },
}

/// VIP range problems are recoverable (fall back to the bare server
/// address) and therefore never escape the mounter; this type only carries
/// the reason into the fallback log line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VipRangeError {
    #[error("range endpoint missing")]
    Missing,

    #[error("'{0}' is not a valid IPv4 address")]
    Unparsable(String),

    #[error("range is reversed: {start} > {end}")]
    Reversed { start: String, end: String },
}

/// Cross-process coordination errors
#[derive(Error, Debug)]
pub enum CoordError {
    /// Coordination directory could not be created or opened
    #[error("Coordination directory '{path}' unusable: {reason}")]
    DirUnusable { path: PathBuf, reason: String },

    /// Signal file could not be written
    #[error("Failed to set signal '{name}': {reason}")]
    SignalFailed { name: String, reason: String },

    /// Lock file could not be acquired or created
    #[error("Lock '{path}' failed: {reason}")]
    LockFailed { path: PathBuf, reason: String },

    /// Counter file held something that does not parse as a count
    #[error("Shared counter '{path}' is corrupt: {contents:?}")]
    CounterCorrupt { path: PathBuf, contents: String },

    /// I/O on coordination state
    #[error("Coordination I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file missing or unreadable
    #[error("Failed to read config '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// Config file is not valid JSON for `TestConfig`
    #[error("Failed to parse config '{path}': {reason}")]
    Invalid { path: PathBuf, reason: String },

    /// Worker count outside the supported range
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Maximum file count of zero makes the workload a no-op
    #[error("max_files must be greater than zero")]
    NoFiles,
}

/// External command errors
#[derive(Error, Debug)]
pub enum ShellError {
    /// Command could not be spawned at all
    #[error("Failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    /// Command ran and exited non-zero
    #[error("Command '{command}' failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Command exceeded the caller's deadline and was killed
    #[error("Command '{command}' timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
}

/// Worker process errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker child process could not be spawned
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },

    /// Worker exited with a failure code
    #[error("Worker {id} failed with exit code {code}")]
    Failed { id: usize, code: i32 },

    /// Worker was killed by a signal (crash, OOM, operator kill)
    #[error("Worker {id} was killed by signal {signal}")]
    Killed { id: usize, signal: i32 },

    /// Waiting on the worker process itself failed
    #[error("Failed to wait for worker {id}: {reason}")]
    WaitFailed { id: usize, reason: String },
}

/// Controller errors
#[derive(Error, Debug)]
pub enum ControllerError {
    /// No client signalled readiness before the startup timeout
    #[error("No client reported readiness within {secs}s")]
    StartupTimeout { secs: u64 },

    /// Controller child process could not be spawned
    #[error("Failed to spawn controller: {reason}")]
    SpawnFailed { reason: String },

    /// Controller child exited with a failure
    #[error("Controller exited with {status}")]
    Exited { status: String },
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, StressError>;
