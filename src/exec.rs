//! Execution of single MRPE entries and formatting of their report lines

use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::cache::{LineState, ResultCache};
use crate::entry::CheckEntry;
use crate::error::{CacheError, LaunchError, MrpeError};
use crate::process::{LaunchRequest, ProcessLauncher};

/// Legacy "unknown" status reported for checks that cannot be started
pub const UNKNOWN_STATUS: i32 = 3;

const START_FAILURE_TEXT: &str = "Unable to execute - plugin may be missing.";

/// Field separator replacing newlines inside one report line
pub const FIELD_SEPARATOR: char = '\x01';

/// Per-run execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    pub timeout: Duration,
    /// Trace-log the raw output of every process
    pub log_output: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            log_output: false,
        }
    }
}

/// Fold a multi-line output into one report field: `\n` becomes
/// [`FIELD_SEPARATOR`] and `\r` becomes a space.
pub fn fix_line_endings(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\n' => FIELD_SEPARATOR,
            '\r' => ' ',
            other => other,
        })
        .collect()
}

/// Run `entry` once and format its report line.
///
/// Returns an empty string when the process timed out or terminated
/// abnormally.
pub fn execute_entry(
    entry: &CheckEntry,
    launcher: &dyn ProcessLauncher,
    options: &ExecOptions,
) -> String {
    let prefix = entry.line_prefix();
    debug!("Run mrpe entry '{prefix}'");

    let request = LaunchRequest {
        program: &entry.exe_path,
        args: &entry.args,
        user: &entry.user,
        command_line: &entry.command_line,
    };

    match launcher.run(&request, options.timeout) {
        Ok(result) => {
            let data = String::from_utf8_lossy(&result.output);
            let data = fix_line_endings(data.trim());
            if options.log_output {
                trace!(
                    "Process [{}]\t Pid [{}]\t Code [{}]\n---\n{}\n---\n",
                    entry.command_line,
                    result.pid,
                    result.exit_code,
                    data
                );
            }
            format!("{prefix}{} {data}", result.exit_code)
        }
        Err(err @ LaunchError::Start { .. }) => {
            debug!("Failed to start mrpe entry: {err}");
            format!("{prefix}{UNKNOWN_STATUS} {START_FAILURE_TEXT}")
        }
        Err(err) => {
            debug!("mrpe entry failed on timeout or just broken: {err}");
            String::new()
        }
    }
}

/// Report line for `entry`, served from `cache` when its policy allows.
pub fn resolve_entry_line(
    entry: &CheckEntry,
    cache: &ResultCache,
    launcher: &dyn ProcessLauncher,
    options: &ExecOptions,
) -> String {
    let Some(policy) = entry.caching else {
        return execute_entry(entry, launcher, options);
    };
    let key = entry.description.as_str();

    let state = match cache.get_line_data(key) {
        Ok((text, LineState::Ready)) => return text,
        Ok((_, state)) => state,
        Err(e) => {
            log_cache_failure(e);
            LineState::Absent
        }
    };

    if state == LineState::Absent {
        if let Err(e) = cache.create_line(key, policy.max_age, policy.add_age) {
            log_cache_failure(e);
        }
    }

    let fresh = execute_entry(entry, launcher, options);
    if let Err(e) = cache.update_line(key, &fresh) {
        log_cache_failure(e);
        return fresh;
    }

    // Read back so the age suffix reflects the new capture time
    match cache.get_line_data(key) {
        Ok((text, _)) => text,
        Err(e) => {
            log_cache_failure(e);
            fresh
        }
    }
}

fn log_cache_failure(e: CacheError) {
    warn!("{}", MrpeError::CacheCorruption(e));
}

#[cfg(test)]
mod tests;
