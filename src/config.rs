//! Configuration types for vfs-stress
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros (client surface plus the
//!   hidden `worker`/`controller` run modes the client spawns)
//! - The JSON test configuration read at startup
//! - The mount-protocol and locking-mode enumerations

use crate::error::ConfigError;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum worker processes a single client may run
pub const MAX_WORKERS_PER_CLIENT: usize = 64;

/// Distributed VFS stress client
#[derive(Parser, Debug, Clone)]
#[command(
    name = "vfs-stress",
    version,
    about = "Distributed VFS stress client - coordinated file churn against NAS cluster mounts",
    long_about = "Mounts a storage cluster export (optionally once per address of a \
                  virtual-IP range), then runs a pool of worker processes that churn \
                  files on the mounts: a bounded creation phase followed by a perpetual \
                  create/rename toggle phase.\n\n\
                  A locally spawned controller process gates test start (client readiness) \
                  and owns the stop signal; press Ctrl+C to stop the test cleanly.",
    after_help = "EXAMPLES:\n    \
        vfs-stress -c controller01 -s cluster01 -e /vol0\n    \
        vfs-stress -c controller01 -s cluster01 --start-vip 10.0.0.1 --end-vip 10.0.0.8\n    \
        vfs-stress -c controller01 -s cluster01 -m smb2 -l off --config test.json",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct CliArgs {
    /// Internal run modes (spawned by the client, not for operators)
    #[command(subcommand)]
    pub command: Option<RunMode>,

    /// Controller host name
    #[arg(short = 'c', long = "controller", value_name = "HOST", required = true)]
    pub controller: Option<String>,

    /// Cluster server hostname
    #[arg(short = 's', long = "server", value_name = "HOST", required = true)]
    pub server: Option<String>,

    /// Export name
    #[arg(short = 'e', long, value_name = "PATH", default_value = "/")]
    pub export: String,

    /// Number of active cluster nodes
    #[arg(short = 'n', long, value_name = "NUM", default_value_t = 0)]
    pub nodes: u32,

    /// Number of filesystem domains
    #[arg(short = 'd', long, value_name = "NUM", default_value_t = 0)]
    pub domains: u32,

    /// Mount protocol version
    #[arg(short = 'm', long, value_enum, value_name = "TYPE", default_value_t = MountType::Nfs3)]
    pub mount_type: MountType,

    /// Start of the virtual IP address range
    #[arg(long, value_name = "ADDR")]
    pub start_vip: Option<String>,

    /// End of the virtual IP address range
    #[arg(long, value_name = "ADDR")]
    pub end_vip: Option<String>,

    /// Locking mode for the churn workload
    #[arg(short = 'l', long = "locking", value_enum, value_name = "MODE", default_value_t = LockingMode::Native)]
    pub locking: LockingMode,

    /// Path to the JSON test configuration
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    pub config: PathBuf,

    /// Quiet mode - suppress the progress line
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Internal run modes spawned by the client process
#[derive(Subcommand, Debug, Clone)]
pub enum RunMode {
    /// Run one churn worker against a set of churn directories
    #[command(hide = true)]
    Worker(WorkerArgs),

    /// Run the controller state machine for one test run
    #[command(hide = true)]
    Controller(ControllerArgs),
}

/// Arguments for the hidden worker run mode
#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Coordination directory shared with the client and controller
    #[arg(long, value_name = "DIR")]
    pub coord_dir: PathBuf,

    /// Worker identifier within the client (embedded in file names)
    #[arg(long, value_name = "ID")]
    pub worker_id: usize,

    /// Maximum number of files the creation phase may reserve
    #[arg(long, value_name = "NUM")]
    pub max_files: u64,

    /// Locking mode for listings and renames
    #[arg(long, value_enum, default_value_t = LockingMode::Native)]
    pub locking: LockingMode,

    /// Churn directory (one per mount point; repeatable)
    #[arg(long = "dir", value_name = "PATH", required = true, action = clap::ArgAction::Append)]
    pub dirs: Vec<PathBuf>,
}

/// Arguments for the hidden controller run mode
#[derive(Args, Debug, Clone)]
pub struct ControllerArgs {
    /// Coordination directory shared with the client and workers
    #[arg(long, value_name = "DIR")]
    pub coord_dir: PathBuf,

    /// Seconds to wait for client readiness before declaring startup failure
    #[arg(long, value_name = "SECS")]
    pub startup_timeout_secs: u64,

    /// Total files the creation phase is expected to produce
    #[arg(long, value_name = "NUM")]
    pub expected_files: u64,

    /// Worker count of the client being gated
    #[arg(long, value_name = "NUM")]
    pub workers: usize,

    /// Name of the directory under test on the mounts
    #[arg(long, value_name = "NAME")]
    pub test_dir: String,

    /// Optional file of seed names for the expected tree model
    #[arg(long, value_name = "FILE")]
    pub names_file: Option<PathBuf>,

    /// Controller host this run reports under
    #[arg(long, value_name = "HOST")]
    pub controller_host: String,
}

/// Sharing-protocol versions supported by the mounter
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountType {
    /// NFS version 3 (oldest supported, the default)
    #[default]
    #[value(name = "nfs3")]
    Nfs3,
    /// NFS version 4.0
    #[value(name = "nfs4")]
    Nfs4,
    /// NFS version 4.1
    #[value(name = "nfs4.1")]
    Nfs41,
    /// SMB version 1
    #[value(name = "smb1")]
    Smb1,
    /// SMB version 2
    #[value(name = "smb2")]
    Smb2,
    /// SMB version 3
    #[value(name = "smb3")]
    Smb3,
}

impl MountType {
    /// Filesystem type handed to `mount -t`
    pub fn fstype(&self) -> &'static str {
        match self {
            MountType::Nfs3 | MountType::Nfs4 | MountType::Nfs41 => "nfs",
            MountType::Smb1 | MountType::Smb2 | MountType::Smb3 => "cifs",
        }
    }

    /// Protocol-version mount options handed to `mount -o`
    pub fn options(&self) -> &'static str {
        match self {
            MountType::Nfs3 => "vers=3",
            MountType::Nfs4 => "vers=4",
            MountType::Nfs41 => "vers=4.1",
            MountType::Smb1 => "vers=1.0",
            MountType::Smb2 => "vers=2.0",
            MountType::Smb3 => "vers=3.0",
        }
    }
}

impl fmt::Display for MountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MountType::Nfs3 => "nfs3",
            MountType::Nfs4 => "nfs4",
            MountType::Nfs41 => "nfs4.1",
            MountType::Smb1 => "smb1",
            MountType::Smb2 => "smb2",
            MountType::Smb3 => "smb3",
        };
        f.write_str(name)
    }
}

/// Locking discipline applied to the churn workload
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockingMode {
    /// Kernel advisory locks (flock)
    #[default]
    Native,
    /// Application-level marker-file locking
    Application,
    /// No locking around listings and renames
    Off,
}

impl fmt::Display for LockingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockingMode::Native => "native",
            LockingMode::Application => "application",
            LockingMode::Off => "off",
        };
        f.write_str(name)
    }
}

fn default_max_files() -> u64 {
    10_000
}

fn default_test_dir() -> String {
    "test_dir".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    300
}

fn default_mount_timeout_secs() -> u64 {
    60
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

/// JSON test configuration read at client startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Worker processes to launch (also the per-client upper bound)
    pub max_workers_per_client: usize,

    /// Base working directory for mount points and coordination state
    pub base_workdir: PathBuf,

    /// Optional file of seed names; a missing file is not an error
    #[serde(default)]
    pub file_names_path: Option<PathBuf>,

    /// Total files the creation phase may produce
    #[serde(default = "default_max_files")]
    pub max_files: u64,

    /// Name of the directory under test created on each mount
    #[serde(default = "default_test_dir")]
    pub test_dir: String,

    /// Controller wait for client readiness
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Deadline for each mount command
    #[serde(default = "default_mount_timeout_secs")]
    pub mount_timeout_secs: u64,

    /// How long workers get to exit after the stop signal before we complain
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl TestConfig {
    /// Load and validate the configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: TestConfig =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers_per_client == 0 || self.max_workers_per_client > MAX_WORKERS_PER_CLIENT
        {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.max_workers_per_client,
                max: MAX_WORKERS_PER_CLIENT,
            });
        }
        if self.max_files == 0 {
            return Err(ConfigError::NoFiles);
        }
        Ok(())
    }
}

/// Read the optional seed-names file.
///
/// A missing file (or no configured path) is `Ok(None)` - the workload
/// falls back to generated names. Any other I/O failure is a real error.
pub fn load_names(path: Option<&Path>) -> io::Result<Option<Vec<String>>> {
    let Some(path) = path else {
        return Ok(None);
    };

    match fs::read_to_string(path) {
        Ok(raw) => {
            let names: Vec<String> = raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            Ok(Some(names))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
