//! Workload generation
//!
//! The file-churn engine (`churn`) and the pool of worker processes that
//! runs it (`pool`). The client launches the pool; each worker process
//! re-enters this crate through the hidden `worker` run mode and executes
//! `churn::run_worker`.

pub mod churn;
pub mod pool;

pub use churn::{
    creation_phase, file_name, run_worker, toggle_name, toggle_pass, toggle_phase, WorkerSpec,
    CREATED_TAG, MOVED_TAG,
};
pub use pool::{first_failure, WorkerOutcome, WorkerPool};
