//! Error taxonomy for MRPE parsing, caching and execution.
//!
//! None of these errors abort a report. Each one degrades to "drop this
//! entry" or "emit a diagnostic line" at the point where it is handled.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the result cache. Every cache operation returns one of these
/// instead of panicking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// `update_line` was called for a key that was never created.
    #[error("suspicious attempt to cache unknown mrpe line '{0}'")]
    UnknownKey(String),

    /// A thread panicked while holding the cache lock.
    #[error("mrpe cache lock poisoned")]
    Poisoned,
}

/// Errors raised while loading and running MRPE entries.
#[derive(Error, Debug)]
pub enum MrpeError {
    /// A `check=` / `include=` directive could not be understood.
    #[error("invalid mrpe directive '{line}': {reason}")]
    MalformedDirective { line: String, reason: String },

    /// A check specification had too few tokens or a bad executable token.
    #[error("invalid check specification '{line}': {reason}")]
    MalformedCheckSpec { line: String, reason: String },

    /// An include file is absent or cannot be read.
    #[error("include file '{}' is not valid or missing: {reason}", path.display())]
    MissingIncludeFile { path: PathBuf, reason: String },

    /// A line inside an include file was not a `check = ...` directive.
    #[error("invalid line '{line}' in '{}:{lineno}'", path.display())]
    MalformedIncludeLine {
        path: PathBuf,
        lineno: usize,
        line: String,
    },

    /// The result cache failed during lookup or mutation.
    #[error("mrpe cache failure: {0}")]
    CacheCorruption(#[from] CacheError),
}

/// Failures reported by a [`crate::process::ProcessLauncher`].
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The child process could not be spawned.
    #[error("failed to start '{command}': {reason}")]
    Start { command: String, reason: String },

    /// The child did not finish inside the timeout and was killed.
    #[error("'{command}' (pid {pid}) timed out after {seconds}s")]
    Timeout {
        command: String,
        seconds: u64,
        pid: u32,
    },

    /// The child terminated without an exit code (e.g. killed by a signal),
    /// or waiting for it failed.
    #[error("'{command}' terminated abnormally: {reason}")]
    Abnormal { command: String, reason: String },
}

impl LaunchError {
    /// True when the process never started.
    pub fn is_start_failure(&self) -> bool {
        matches!(self, LaunchError::Start { .. })
    }
}
