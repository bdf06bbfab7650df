//! Thin wrapper around external commands
//!
//! Only the mounter uses this: `mount` and `umount` must run as real
//! commands (with elevated privileges) against the kernel. Deliberately
//! stateless - argument logging, stderr capture, and a kill-on-deadline
//! timeout are all it adds.

use crate::error::ShellError;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

fn render(program: &str, args: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Run a command to completion, failing on a non-zero exit status.
pub fn run(program: &str, args: &[&str]) -> Result<(), ShellError> {
    let command = render(program, args);
    debug!(%command, "Running command");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ShellError::SpawnFailed {
            command: command.clone(),
            reason: e.to_string(),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ShellError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a command with a deadline; the process is killed on expiry.
///
/// Polls `try_wait` at a bounded interval rather than blocking in `wait`,
/// since std offers no timed wait for child processes.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<(), ShellError> {
    let command = render(program, args);
    debug!(%command, timeout_secs = timeout.as_secs(), "Running command with deadline");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ShellError::SpawnFailed {
            command: command.clone(),
            reason: e.to_string(),
        })?;

    let deadline = Instant::now() + timeout;
    let poll = Duration::from_millis(50);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if status.success() {
                    return Ok(());
                }
                let stderr = child
                    .stderr
                    .take()
                    .and_then(|mut s| {
                        use std::io::Read;
                        let mut buf = String::new();
                        s.read_to_string(&mut buf).ok().map(|_| buf)
                    })
                    .unwrap_or_default();
                return Err(ShellError::CommandFailed {
                    command,
                    status: status.to_string(),
                    stderr: stderr.trim().to_string(),
                });
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    warn!(%command, "Command deadline expired, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ShellError::Timeout {
                        command,
                        secs: timeout.as_secs(),
                    });
                }
                thread::sleep(poll);
            }
            Err(e) => {
                return Err(ShellError::SpawnFailed {
                    command,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Run a command under `sudo -n` with a deadline.
///
/// `-n` fails fast instead of prompting when the privilege is missing, so
/// a misconfigured host surfaces as a mount error rather than a hang.
pub fn run_privileged(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<(), ShellError> {
    let mut sudo_args = vec!["-n", program];
    sudo_args.extend_from_slice(args);
    run_with_timeout("sudo", &sudo_args, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success() {
        run("true", &[]).unwrap();
    }

    #[test]
    fn test_run_captures_failure_status() {
        let err = run("false", &[]).unwrap_err();
        assert!(matches!(err, ShellError::CommandFailed { .. }));
    }

    #[test]
    fn test_run_missing_binary_is_spawn_failure() {
        let err = run("definitely-not-a-real-binary", &[]).unwrap_err();
        assert!(matches!(err, ShellError::SpawnFailed { .. }));
    }

    #[test]
    fn test_timeout_kills_long_command() {
        let err =
            run_with_timeout("sleep", &["30"], Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, ShellError::Timeout { secs: 0, .. }));
    }

    #[test]
    fn test_timeout_passes_fast_command() {
        run_with_timeout("true", &[], Duration::from_secs(5)).unwrap();
    }
}
