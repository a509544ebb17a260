//! In-memory launcher for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{LaunchRequest, ProcessLauncher, ProcessOutput};
use crate::error::LaunchError;

type Behavior =
    Box<dyn Fn(&LaunchRequest<'_>, usize) -> Result<ProcessOutput, LaunchError> + Send + Sync>;

/// Answers every run with a closure of (request, call number starting at 1).
pub struct FakeLauncher {
    calls: AtomicUsize,
    behavior: Behavior,
}

impl FakeLauncher {
    pub fn new<F>(behavior: F) -> Self
    where
        F: Fn(&LaunchRequest<'_>, usize) -> Result<ProcessOutput, LaunchError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            calls: AtomicUsize::new(0),
            behavior: Box::new(behavior),
        }
    }

    /// Exit 0 with output `run <n>`.
    pub fn counting() -> Self {
        Self::new(|_, n| Ok(output(0, &format!("run {n}"))))
    }

    /// Echo the program name with the given exit code.
    pub fn echo(exit_code: i32) -> Self {
        Self::new(move |req, _| Ok(output(exit_code, req.program)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessLauncher for FakeLauncher {
    fn run(
        &self,
        request: &LaunchRequest<'_>,
        _timeout: Duration,
    ) -> Result<ProcessOutput, LaunchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.behavior)(request, n)
    }
}

pub fn output(exit_code: i32, text: &str) -> ProcessOutput {
    ProcessOutput {
        pid: 4242,
        exit_code,
        output: text.as_bytes().to_vec(),
    }
}
