//! Child process primitive for MRPE checks
//!
//! A [`ProcessLauncher`] starts a program, optionally as another user, waits
//! up to a timeout and hands back the exit code and captured output. The
//! child leads its own process group and is owned by a [`ChildGuard`] for
//! the whole run, so it and anything it left running in the background are
//! killed on every exit path.

#[cfg(test)]
pub(crate) mod fake;
mod launcher;

pub use launcher::{ChildGuard, SystemLauncher, MAX_OUTPUT_SIZE};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use std::time::Duration;

use crate::error::LaunchError;

/// What to run.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    /// Identity to run as; empty means the current one
    pub user: &'a str,
    /// Display form used in logs and errors
    pub command_line: &'a str,
}

/// A process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub pid: u32,
    pub exit_code: i32,
    /// Raw stdout followed by raw stderr
    pub output: Vec<u8>,
}

/// Runs one command with a timeout.
pub trait ProcessLauncher: Send + Sync {
    fn run(&self, request: &LaunchRequest<'_>, timeout: Duration)
        -> Result<ProcessOutput, LaunchError>;
}

/// Check if any process is left in the process group `pgid`
///
/// Sends the null signal to the group; `EPERM` still means members exist.
#[cfg(unix)]
pub fn process_group_alive(pgid: u32) -> bool {
    let Some(pgid) = group_pid(pgid) else {
        return false;
    };

    match killpg(pgid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn process_group_alive(_pgid: u32) -> bool {
    false
}

/// SIGKILL every process in the process group `pgid`.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) {
    if let Some(pgid) = group_pid(pgid) {
        // The group may already be empty
        let _ = killpg(pgid, Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) {}

/// Groups 0 and 1 would address ourselves or init, never a check's group.
#[cfg(unix)]
fn group_pid(pgid: u32) -> Option<Pid> {
    match i32::try_from(pgid) {
        Ok(pgid) if pgid > 1 => Some(Pid::from_raw(pgid)),
        _ => None,
    }
}
