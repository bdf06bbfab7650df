//! vfs-stress - Distributed VFS stress client
//!
//! A load generator for network-attached storage clusters. The client
//! mounts a cluster export - once per address of a virtual-IP range when
//! one is given, so connections spread across cluster nodes - and runs a
//! pool of worker processes that churn files on the mounts: a bounded
//! creation phase followed by a perpetual create/rename toggle phase. A
//! locally spawned controller process gates test start and owns the stop
//! signal.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Storage Cluster                        │
//! │                 (VIP 10.0.0.1 .. VIP 10.0.0.N)               │
//! └───────┬──────────────────┬──────────────────────┬────────────┘
//!         │                  │                      │  mount per VIP
//!         ▼                  ▼                      ▼
//!   /mnt/vfs_stress_1  /mnt/vfs_stress_2  ...  /mnt/vfs_stress_N
//!         ▲                  ▲                      ▲
//!         │   create / rename churn (every worker, every mount)  │
//! ┌───────┴──────────────────┴──────────────────────┴────────────┐
//! │   Worker Process 0   Worker Process 1  ...  Worker Process M │
//! │        │                   │                      │          │
//! │        └────────────┬──────┴──────────────────────┘          │
//! │                     ▼                                        │
//! │        ┌──────────────────────────┐     ┌─────────────────┐  │
//! │        │ Coordination directory   │◄────┤   Controller    │  │
//! │        │  shared counter (flock)  │     │    process      │  │
//! │        │  churn lock              │     │ WAITING→RUNNING │  │
//! │        │  ready/halt/stop signals │     │ →STOPPING→DONE  │  │
//! │        └──────────────────────────┘     └─────────────────┘  │
//! │                        Client process                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Worker and controller processes are children of the client, re-entering
//! the same binary through hidden run modes. All cross-process state lives
//! in the coordination directory: write-once signal files and flock-backed
//! counter/lock files, so a crashed worker can never orphan a lock.
//!
//! # Example
//!
//! ```bash
//! # Stress a cluster through a VIP range with NFSv3 mounts
//! vfs-stress -c controller01 -s cluster01 -e /vol0 \
//!     --start-vip 10.0.0.1 --end-vip 10.0.0.8
//!
//! # Single mount over SMB2, churn locking off
//! vfs-stress -c controller01 -s cluster01 -m smb2 -l off
//! ```

pub mod config;
pub mod controller;
pub mod coord;
pub mod error;
pub mod mount;
pub mod progress;
pub mod shell;
pub mod tree;
pub mod workload;

pub use config::{CliArgs, LockingMode, MountType, RunMode, TestConfig};
pub use controller::{Controller, ControllerReport, ControllerState};
pub use coord::{SharedCounter, SignalFile, SyncDir};
pub use error::{Result, StressError};
pub use mount::{MountPoint, MountTarget, Mounter};
pub use tree::DirTree;
pub use workload::{WorkerOutcome, WorkerPool, WorkerSpec};
