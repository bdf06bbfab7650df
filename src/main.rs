//! vfs-stress - Distributed VFS stress client
//!
//! Entry point for all three run modes: the operator-facing client, plus
//! the hidden `worker` and `controller` modes the client spawns as child
//! processes of the same binary.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use std::path::PathBuf;
use std::process::{Child, Command, ExitCode, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vfs_stress::config::{CliArgs, ControllerArgs, LockingMode, RunMode, TestConfig, WorkerArgs};
use vfs_stress::coord::SyncDir;
use vfs_stress::error::{ControllerError, StressError};
use vfs_stress::mount::{self, MountTarget, Mounter};
use vfs_stress::progress::{print_header, print_summary, ProgressReporter};
use vfs_stress::{controller, workload};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    match args.command.clone() {
        Some(RunMode::Worker(worker_args)) => run_worker_mode(worker_args),
        Some(RunMode::Controller(controller_args)) => run_controller_mode(controller_args),
        None => run_client(args),
    }
}

fn setup_logging(verbose: bool) {
    let default_directive = if verbose {
        "vfs_stress=debug"
    } else {
        "vfs_stress=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Hidden worker run mode: churn until the controller raises stop.
fn run_worker_mode(args: WorkerArgs) -> Result<()> {
    // An interrupt asks the controller to stop; the worker itself keeps
    // going until the stop signal arrives.
    let halt = SyncDir::open(&args.coord_dir)?.halt();
    ctrlc::set_handler(move || {
        let _ = halt.set();
    })
    .context("Failed to set signal handler")?;

    let result = workload::run_worker(&args);

    if result.is_err() {
        // A dying worker is an unrecoverable failure for the whole run;
        // request the stop so the other workers wind down and the client's
        // outcome aggregation can complete.
        if let Ok(sync) = SyncDir::open(&args.coord_dir) {
            let _ = sync.halt().set();
        }
    }

    Ok(result?)
}

/// Hidden controller run mode: drive the state machine to completion.
fn run_controller_mode(args: ControllerArgs) -> Result<()> {
    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("Failed to set signal handler")?;

    let report = controller::run_controller(&args, interrupt_rx)?;
    info!(
        files_created = report.files_created,
        expected = report.expected_files,
        "Controller done"
    );
    Ok(())
}

/// The operator-facing client: mount, spawn controller and workers, signal
/// readiness, aggregate outcomes, tear down.
fn run_client(args: CliArgs) -> Result<()> {
    let controller_host = args
        .controller
        .clone()
        .context("controller host is required")?;
    let server = args.server.clone().context("server host is required")?;

    let config = TestConfig::load(&args.config)
        .with_context(|| format!("Invalid configuration '{}'", args.config.display()))?;

    info!(
        controller = %controller_host,
        server = %server,
        workers = config.max_workers_per_client,
        "Starting VFS stress client"
    );

    // Mount the export - once per VIP, or once on the bare server address
    // when no usable range was given. Fatal on the first failed mount.
    let target = MountTarget::new(
        args.mount_type,
        &server,
        &args.export,
        args.start_vip.clone(),
        args.end_vip.clone(),
        args.nodes,
        args.domains,
    );
    let mut mounter = Mounter::new(
        target,
        &config.base_workdir,
        Duration::from_secs(config.mount_timeout_secs),
    );
    mounter.mount_all().context("Failed to mount work paths")?;

    // Every mount shows the same remote export, so creating the test
    // directory through each mount is idempotent remotely and gives us the
    // local churn paths.
    let mut churn_dirs = Vec::new();
    for point in mounter.mount_points() {
        let dir = mount::create_test_dir(&point.path, &config.test_dir)
            .with_context(|| format!("Failed to create test dir on '{}'", point.path.display()))?;
        churn_dirs.push(dir);
    }

    if !args.quiet {
        print_header(
            &server,
            &args.export,
            churn_dirs.len(),
            config.max_workers_per_client,
        );
    }

    let sync = SyncDir::create(
        config
            .base_workdir
            .join(format!("vfs_stress_run_{}", std::process::id())),
    )
    .map_err(StressError::from)?;

    // First interrupt requests a clean stop through the controller; a
    // second one force-exits.
    let halt = sync.halt();
    let interrupted = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            eprintln!("\nForce shutdown!");
            std::process::exit(130);
        }
        eprintln!("\nStopping test... (press Ctrl+C again to force)");
        let _ = halt.set();
    })
    .context("Failed to set signal handler")?;

    let exe = std::env::current_exe().context("Cannot locate own executable")?;

    info!("Starting controller");
    let mut controller_child = spawn_controller(
        &exe,
        &sync,
        &config,
        &controller_host,
        args.verbose,
    )
    .map_err(|e| ControllerError::SpawnFailed {
        reason: e.to_string(),
    })
    .map_err(StressError::from)?;

    info!("Starting worker processes");
    let pool = match workload::WorkerPool::launch(config.max_workers_per_client, |id| {
        spawn_worker(&exe, &sync, &config, &churn_dirs, args.locking, id, args.verbose)
    }) {
        Ok(pool) => pool,
        Err(e) => {
            // Wind the controller down before propagating; readiness was
            // never signalled, so a halt request is what unblocks it.
            let _ = sync.halt().set();
            let _ = controller_child.wait();
            mounter.unmount_all();
            sync.cleanup();
            return Err(StressError::from(e).into());
        }
    };

    // Readiness means "workers are running", not "workload complete".
    sync.ready().set().map_err(StressError::from)?;
    info!(workers = pool.len(), "All workers launched, client ready");

    let reporter = if args.quiet {
        None
    } else {
        Some(ProgressReporter::spawn(sync.clone(), config.max_files))
    };

    // Block on every worker's outcome; the first failure wins.
    let outcomes = pool.wait_all(Duration::from_secs(config.shutdown_grace_secs));
    if let Some(reporter) = reporter {
        reporter.finish();
    }

    let mut failure: Option<StressError> = None;
    let mut failed_workers = 0usize;
    for outcome in outcomes {
        if let Err(e) = outcome.result {
            error!(worker = outcome.worker_id, error = %e, "Worker failed");
            failed_workers += 1;
            if failure.is_none() {
                failure = Some(e.into());
            }
        }
    }

    // Even after a worker failure the controller must be joined so the
    // orchestration winds down cleanly; make sure it has a stop request.
    if failure.is_some() {
        let _ = sync.halt().set();
    }

    let controller_status = controller_child
        .wait()
        .context("Failed to join controller process")?;
    if !controller_status.success() {
        let err = ControllerError::Exited {
            status: controller_status.to_string(),
        };
        error!(error = %err, "Controller reported failure");
        if failure.is_none() {
            failure = Some(err.into());
        }
    }

    let files_created = sync.counter().value().unwrap_or(0);

    mounter.unmount_all();
    sync.cleanup();

    if !args.quiet {
        print_summary(
            files_created,
            config.max_files,
            config.max_workers_per_client,
            failed_workers,
        );
    }

    match failure {
        Some(e) => Err(e.into()),
        None => {
            info!("All done");
            Ok(())
        }
    }
}

fn spawn_controller(
    exe: &PathBuf,
    sync: &SyncDir,
    config: &TestConfig,
    controller_host: &str,
    verbose: bool,
) -> std::io::Result<Child> {
    let mut cmd = Command::new(exe);
    cmd.arg("controller")
        .arg("--coord-dir")
        .arg(sync.root())
        .arg("--startup-timeout-secs")
        .arg(config.startup_timeout_secs.to_string())
        .arg("--expected-files")
        .arg(config.max_files.to_string())
        .arg("--workers")
        .arg(config.max_workers_per_client.to_string())
        .arg("--test-dir")
        .arg(&config.test_dir)
        .arg("--controller-host")
        .arg(controller_host)
        .stdin(Stdio::null());
    if let Some(names) = &config.file_names_path {
        cmd.arg("--names-file").arg(names);
    }
    if verbose {
        cmd.env("RUST_LOG", "vfs_stress=debug");
    }
    cmd.spawn()
}

fn spawn_worker(
    exe: &PathBuf,
    sync: &SyncDir,
    config: &TestConfig,
    churn_dirs: &[PathBuf],
    locking: LockingMode,
    id: usize,
    verbose: bool,
) -> std::io::Result<Child> {
    let mut cmd = Command::new(exe);
    cmd.arg("worker")
        .arg("--coord-dir")
        .arg(sync.root())
        .arg("--worker-id")
        .arg(id.to_string())
        .arg("--max-files")
        .arg(config.max_files.to_string())
        .arg("--locking")
        .arg(locking.to_string())
        .stdin(Stdio::null());
    for dir in churn_dirs {
        cmd.arg("--dir").arg(dir);
    }
    if verbose {
        cmd.env("RUST_LOG", "vfs_stress=debug");
    }
    cmd.spawn()
}
