//! Controller state machine
//!
//! The controller runs as its own process, spawned by the client. It gates
//! test start (waiting for client readiness under a timeout), holds the
//! logical model of the directory under test while the workload runs, and
//! owns the stop signal: the `Stopping` transition is the only place in
//! the system that sets it. Workers and the client only ever *request* a
//! stop through the halt signal (or an operator interrupt), so shutdown
//! stays a single-owner decision.

use crate::config::ControllerArgs;
use crate::coord::SyncDir;
use crate::error::{ControllerError, Result};
use crate::tree::DirTree;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Interval between checks of signals and interrupts
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Controller lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    WaitingForClients,
    Running,
    Stopping,
    Done,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::WaitingForClients => "WAITING_FOR_CLIENTS",
            ControllerState::Running => "RUNNING",
            ControllerState::Stopping => "STOPPING",
            ControllerState::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Final state flushed before the controller exits
#[derive(Debug, Clone)]
pub struct ControllerReport {
    /// Files the workload reserved (counter value at shutdown)
    pub files_created: u64,
    /// Files the tree model expected
    pub expected_files: u64,
}

/// The controller for one test run
pub struct Controller {
    sync: SyncDir,
    tree: DirTree,
    startup_timeout: Duration,
    interrupts: Receiver<()>,
    state: ControllerState,
    visited: Vec<ControllerState>,
}

impl Controller {
    pub fn new(
        sync: SyncDir,
        tree: DirTree,
        startup_timeout: Duration,
        interrupts: Receiver<()>,
    ) -> Self {
        Self {
            sync,
            tree,
            startup_timeout,
            interrupts,
            state: ControllerState::WaitingForClients,
            visited: vec![ControllerState::WaitingForClients],
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// States entered so far, in order.
    pub fn visited_states(&self) -> &[ControllerState] {
        &self.visited
    }

    fn transition(&mut self, next: ControllerState) {
        info!(from = %self.state, to = %next, "Controller state transition");
        self.state = next;
        self.visited.push(next);
    }

    /// Sleep one poll interval, waking early on an operator interrupt.
    /// Returns whether an interrupt arrived.
    fn pause(&self) -> bool {
        match self.interrupts.recv_timeout(POLL_INTERVAL) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(POLL_INTERVAL);
                false
            }
        }
    }

    /// Drive the state machine to completion.
    ///
    /// Returns the final report, or `StartupTimeout` when no client
    /// signalled readiness in time - in which case the stop signal has
    /// still been raised so any workers that did start wind down.
    pub fn run(&mut self) -> std::result::Result<ControllerReport, ControllerError> {
        info!(
            state = %self.state,
            timeout_secs = self.startup_timeout.as_secs(),
            "Controller waiting for client readiness"
        );

        let deadline = Instant::now() + self.startup_timeout;
        let mut timed_out = false;
        let mut interrupted = false;

        loop {
            if self.sync.ready().is_set() {
                break;
            }
            if self.sync.halt().is_set() {
                // Client aborted during its own startup.
                info!("Stop requested before readiness");
                interrupted = true;
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    timeout_secs = self.startup_timeout.as_secs(),
                    "No client reported readiness, aborting startup"
                );
                timed_out = true;
                break;
            }
            if self.pause() {
                info!("Interrupt received while waiting for clients");
                interrupted = true;
                break;
            }
        }

        // Interrupted or timed out before readiness: fall straight through
        // to Stopping without ever running.
        if !timed_out && !interrupted {
            self.transition(ControllerState::Running);
            info!(tree = %self.tree.summary(), "Test running, press Ctrl+C to stop");

            loop {
                if self.sync.halt().is_set() {
                    info!("Stop requested");
                    break;
                }
                if self.pause() {
                    info!("Interrupt received, stopping test");
                    break;
                }
            }
        }

        self.transition(ControllerState::Stopping);
        // Sole setter of the stop signal; repeated set() is a no-op.
        if let Err(e) = self.sync.stop().set() {
            warn!(error = %e, "Failed to raise stop signal");
        }

        self.transition(ControllerState::Done);

        let files_created = match self.sync.counter().value() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Could not read final counter value");
                0
            }
        };

        info!(
            state = %self.state,
            files_created,
            expected = self.tree.expected_files(),
            "Controller final state"
        );

        if timed_out {
            return Err(ControllerError::StartupTimeout {
                secs: self.startup_timeout.as_secs(),
            });
        }

        Ok(ControllerReport {
            files_created,
            expected_files: self.tree.expected_files(),
        })
    }
}

/// Entry point for the controller run mode.
pub fn run_controller(args: &ControllerArgs, interrupts: Receiver<()>) -> Result<ControllerReport> {
    let sync = SyncDir::open(&args.coord_dir)?;
    let names = crate::config::load_names(args.names_file.as_deref())?;
    let tree = DirTree::new(&args.test_dir, names, args.expected_files);

    info!(
        controller_host = %args.controller_host,
        workers = args.workers,
        "Controller starting"
    );

    let mut controller = Controller::new(
        sync,
        tree,
        Duration::from_secs(args.startup_timeout_secs),
        interrupts,
    );

    Ok(controller.run()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn test_setup(root: &std::path::Path) -> (SyncDir, DirTree) {
        let sync = SyncDir::create(root.join("run")).unwrap();
        let tree = DirTree::new("test_dir", None, 5);
        (sync, tree)
    }

    #[test]
    fn test_startup_timeout_reports_failure_without_running() {
        let tmp = tempfile::tempdir().unwrap();
        let (sync, tree) = test_setup(tmp.path());
        let stop = sync.stop();
        let (_tx, rx) = bounded::<()>(1);

        let mut controller =
            Controller::new(sync, tree, Duration::from_millis(200), rx);
        let err = controller.run().unwrap_err();

        assert!(matches!(err, ControllerError::StartupTimeout { .. }));
        // Never reached RUNNING, but still raised the stop signal on the
        // way down so stray workers wind down.
        assert!(!controller
            .visited_states()
            .contains(&ControllerState::Running));
        assert!(controller
            .visited_states()
            .contains(&ControllerState::Stopping));
        assert_eq!(controller.state(), ControllerState::Done);
        assert!(stop.is_set());
    }

    #[test]
    fn test_halt_request_stops_a_running_test() {
        let tmp = tempfile::tempdir().unwrap();
        let (sync, tree) = test_setup(tmp.path());
        let stop = sync.stop();
        sync.ready().set().unwrap();
        sync.halt().set().unwrap();
        let (_tx, rx) = bounded::<()>(1);

        let mut controller = Controller::new(sync, tree, Duration::from_secs(5), rx);
        let report = controller.run().unwrap();

        assert!(controller
            .visited_states()
            .contains(&ControllerState::Running));
        assert_eq!(controller.state(), ControllerState::Done);
        assert!(stop.is_set());
        assert_eq!(report.expected_files, 5);
    }

    #[test]
    fn test_interrupt_translates_to_stop_signal() {
        let tmp = tempfile::tempdir().unwrap();
        let (sync, tree) = test_setup(tmp.path());
        let stop = sync.stop();
        sync.ready().set().unwrap();
        let (tx, rx) = bounded::<()>(1);

        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            tx.send(()).unwrap();
        });

        let mut controller = Controller::new(sync, tree, Duration::from_secs(5), rx);
        controller.run().unwrap();
        sender.join().unwrap();

        assert_eq!(controller.state(), ControllerState::Done);
        assert!(stop.is_set());
    }

    #[test]
    fn test_stop_signal_already_set_is_harmless() {
        let tmp = tempfile::tempdir().unwrap();
        let (sync, tree) = test_setup(tmp.path());
        sync.ready().set().unwrap();
        sync.halt().set().unwrap();
        // Another process raced us to the stop file; set() stays a no-op.
        sync.stop().set().unwrap();
        let (_tx, rx) = bounded::<()>(1);

        let mut controller = Controller::new(sync, tree, Duration::from_secs(5), rx);
        controller.run().unwrap();
        assert_eq!(controller.state(), ControllerState::Done);
    }

    #[test]
    fn test_report_carries_counter_value() {
        let tmp = tempfile::tempdir().unwrap();
        let (sync, tree) = test_setup(tmp.path());
        sync.ready().set().unwrap();
        sync.halt().set().unwrap();
        for _ in 0..3 {
            sync.counter().try_reserve_next(5).unwrap();
        }
        let (_tx, rx) = bounded::<()>(1);

        let mut controller = Controller::new(sync, tree, Duration::from_secs(5), rx);
        let report = controller.run().unwrap();
        assert_eq!(report.files_created, 3);
        assert_eq!(report.expected_files, 5);
    }
}
