//! Bounded execution of host commands.
//!
//! A driver that has wedged a mount can make even `cat /proc/mounts | grep`
//! style checks hang, so every host command runs with a deadline. The child is
//! started in its own process group; on timeout the whole group is killed and
//! the caller gets [`HostCheckError::TimedOut`] rather than a hang.

use std::os::unix::process::CommandExt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

use crate::host_check::HostCheckError;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit status of the command
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8)
    pub stdout: String,
    /// Captured standard error (lossy UTF-8)
    pub stderr: String,
}

impl CommandOutput {
    /// Exit code, or `None` if the command was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run `command` to completion, waiting at most `timeout`.
///
/// `label` is only used in errors and logs.
pub fn run_with_timeout(
    mut command: Command,
    label: &str,
    timeout: Duration,
) -> Result<CommandOutput, HostCheckError> {
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
        .map_err(|source| HostCheckError::Spawn {
            command: label.to_string(),
            source,
        })?;

    let child_id = child.id();
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(output)) => Ok(CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(source)) => Err(HostCheckError::Wait {
            command: label.to_string(),
            source,
        }),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            // The group id equals the child's pid because of process_group(0).
            if let Ok(raw) = i32::try_from(child_id)
                && let Err(errno) = killpg(Pid::from_raw(raw), Signal::SIGKILL)
            {
                tracing::warn!(command = label, %errno, "failed to kill timed-out command");
            }
            Err(HostCheckError::TimedOut {
                command: label.to_string(),
                timeout,
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(HostCheckError::Wait {
            command: label.to_string(),
            source: std::io::Error::other("wait thread terminated unexpectedly"),
        }),
    }
}
