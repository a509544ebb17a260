//! Launcher backed by `std::process` and `wait-timeout`

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use wait_timeout::ChildExt;

use super::{
    kill_process_group, process_group_alive, LaunchRequest, ProcessLauncher, ProcessOutput,
};
use crate::error::LaunchError;

/// Minimum time left for draining the pipes once the child has exited
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Maximum captured output per stream (10MB)
pub const MAX_OUTPUT_SIZE: usize = 10 * 1024 * 1024;

const TRUNCATION_NOTE: &[u8] = b"\n[output truncated at 10MB]";

/// Owns a running child that leads its own process group.
///
/// Dropping the guard kills the whole group and reaps the child unless it
/// has already been waited for. Killing the group also closes the pipe ends
/// held by background processes, so the reader threads finish instead of
/// outliving the run.
pub struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Wait up to `timeout`; `None` means the child is still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let status = self.child.wait_timeout(timeout)?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Kill whatever is left in the child's process group.
    pub fn kill_group(&self) {
        let pgid = self.id();
        if process_group_alive(pgid) {
            debug!(pgid, "killing leftover processes of the check");
            kill_process_group(pgid);
        }
    }

    /// Kill the process group and the child (SIGKILL on Unix), then reap it.
    pub fn kill_and_reap(&mut self) {
        if self.reaped {
            return;
        }
        self.kill_group();
        // The child may already be gone
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill_and_reap();
    }
}

/// Runs programs directly (no shell) with piped stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn run(
        &self,
        request: &LaunchRequest<'_>,
        timeout: Duration,
    ) -> Result<ProcessOutput, LaunchError> {
        let deadline = Instant::now() + timeout;
        let start_error = |reason: String| LaunchError::Start {
            command: request.command_line.to_string(),
            reason,
        };

        let mut cmd = Command::new(request.program);
        cmd.args(request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        if !request.user.is_empty() {
            run_as_user(&mut cmd, request.user).map_err(start_error)?;
        }

        let child = cmd.spawn().map_err(|e| start_error(e.to_string()))?;
        let mut guard = ChildGuard::new(child);
        let pid = guard.id();
        let timed_out = || LaunchError::Timeout {
            command: request.command_line.to_string(),
            seconds: timeout.as_secs(),
            pid,
        };

        // Drain the pipes while waiting, a full pipe buffer would block the child
        let stdout_rx = spawn_reader(guard.child_mut().stdout.take());
        let stderr_rx = spawn_reader(guard.child_mut().stderr.take());

        let status = match guard.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                guard.kill_and_reap();
                return Err(timed_out());
            }
            Err(e) => {
                return Err(LaunchError::Abnormal {
                    command: request.command_line.to_string(),
                    reason: format!("wait failed: {e}"),
                });
            }
        };

        // Background children would keep the pipes open
        guard.kill_group();

        let Some(exit_code) = status.code() else {
            return Err(LaunchError::Abnormal {
                command: request.command_line.to_string(),
                reason: describe_status(&status),
            });
        };

        let output = collect_output(&stdout_rx, &stderr_rx, deadline).ok_or_else(timed_out)?;

        debug!(pid, exit_code, "mrpe process finished: {}", request.command_line);
        Ok(ProcessOutput {
            pid,
            exit_code,
            output,
        })
    }
}

/// Stdout followed by stderr, or `None` if a pipe is still open at the
/// deadline (extended to at least [`OUTPUT_GRACE`]).
fn collect_output(
    stdout: &mpsc::Receiver<Vec<u8>>,
    stderr: &mpsc::Receiver<Vec<u8>>,
    deadline: Instant,
) -> Option<Vec<u8>> {
    let window = || deadline.saturating_duration_since(Instant::now()).max(OUTPUT_GRACE);
    let mut output = stdout.recv_timeout(window()).ok()?;
    output.extend(stderr.recv_timeout(window()).ok()?);
    Some(output)
}

#[cfg(unix)]
fn run_as_user(cmd: &mut Command, name: &str) -> Result<(), String> {
    use nix::unistd::User;
    use std::os::unix::process::CommandExt;

    let user = User::from_name(name)
        .map_err(|e| format!("failed to look up user '{name}': {e}"))?
        .ok_or_else(|| format!("unknown user '{name}'"))?;
    cmd.uid(user.uid.as_raw()).gid(user.gid.as_raw());
    Ok(())
}

#[cfg(not(unix))]
fn run_as_user(_cmd: &mut Command, name: &str) -> Result<(), String> {
    Err(format!("running as '{name}' is not supported on this platform"))
}

#[cfg(unix)]
fn describe_status(status: &ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(signal) => format!("killed by signal {signal}"),
        None => format!("no exit code ({status})"),
    }
}

#[cfg(not(unix))]
fn describe_status(status: &ExitStatus) -> String {
    format!("no exit code ({status})")
}

fn spawn_reader<R: Read + Send + 'static>(stream: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    match stream {
        Some(stream) => {
            thread::spawn(move || {
                let _ = tx.send(read_stream_capped(stream));
            });
        }
        None => {
            let _ = tx.send(Vec::new());
        }
    }
    rx
}

/// Read a stream up to [`MAX_OUTPUT_SIZE`] bytes, draining the rest.
fn read_stream_capped<R: Read>(mut stream: R) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let remaining = MAX_OUTPUT_SIZE.saturating_sub(buf.len());
                let to_copy = n.min(remaining);
                buf.extend_from_slice(&chunk[..to_copy]);
                if to_copy < n {
                    // Keep draining so the child does not die of a broken pipe
                    while stream.read(&mut chunk).unwrap_or(0) > 0 {}
                    buf.extend_from_slice(TRUNCATION_NOTE);
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    buf
}
