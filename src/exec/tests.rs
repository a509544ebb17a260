//! Tests for entry execution and cache resolution

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use super::*;
use crate::cache::{Clock, ManualClock};
use crate::markers::Markers;
use crate::process::fake::{output, FakeLauncher};

fn entry(spec: &str) -> CheckEntry {
    CheckEntry::parse("", spec, &Markers::new("/opt/agent")).unwrap()
}

fn options() -> ExecOptions {
    ExecOptions {
        timeout: Duration::from_secs(5),
        log_output: true,
    }
}

#[test]
fn test_fix_line_endings() {
    assert_eq!(fix_line_endings("a\rb\n\n"), "a b\x01\x01");
    assert_eq!(fix_line_endings("plain"), "plain");
}

#[test]
fn test_execute_formats_success_line() {
    let launcher = FakeLauncher::new(|_, _| Ok(output(1, "  WARN - load 4\r\nperf\n ")));
    let line = execute_entry(&entry("Load /usr/lib/check_load -w 3"), &launcher, &options());
    assert_eq!(line, "(check_load) Load 1 WARN - load 4 \x01perf");
}

#[test]
fn test_execute_passes_program_args_and_user() {
    let launcher = FakeLauncher::new(|req, _| {
        assert_eq!(req.program, "/usr/lib/check_load");
        assert_eq!(req.args.to_vec(), vec!["-w".to_string(), "3".to_string()]);
        assert_eq!(req.user, "nagios");
        assert_eq!(req.command_line, "/usr/lib/check_load -w 3");
        Ok(output(0, "OK"))
    });
    let mut e = entry("Load /usr/lib/check_load -w 3");
    e.user = "nagios".to_string();
    assert_eq!(execute_entry(&e, &launcher, &options()), "(check_load) Load 0 OK");
}

#[test]
fn test_execute_start_failure_line() {
    let launcher = FakeLauncher::new(|req, _| {
        Err(LaunchError::Start {
            command: req.command_line.to_string(),
            reason: "No such file or directory".to_string(),
        })
    });
    let line = execute_entry(&entry("BadFile 'sss.bat'"), &launcher, &options());
    assert_eq!(
        line,
        "(sss.bat) BadFile 3 Unable to execute - plugin may be missing."
    );
}

#[test]
fn test_execute_timeout_and_abnormal_give_nothing() {
    let timeout = FakeLauncher::new(|req, _| {
        Err(LaunchError::Timeout {
            command: req.command_line.to_string(),
            seconds: 5,
            pid: 1,
        })
    });
    assert!(execute_entry(&entry("Slow /bin/sleep"), &timeout, &options()).is_empty());

    let abnormal = FakeLauncher::new(|req, _| {
        Err(LaunchError::Abnormal {
            command: req.command_line.to_string(),
            reason: "killed by signal 9".to_string(),
        })
    });
    assert!(execute_entry(&entry("Crash /bin/crash"), &abnormal, &options()).is_empty());
}

#[test]
fn test_uncached_entry_always_executes() {
    let launcher = FakeLauncher::counting();
    let cache = ResultCache::new();
    let e = entry("Time /bin/date");

    assert_eq!(resolve_entry_line(&e, &cache, &launcher, &options()), "(date) Time 0 run 1");
    assert_eq!(resolve_entry_line(&e, &cache, &launcher, &options()), "(date) Time 0 run 2");
    assert_eq!(launcher.calls(), 2);
    assert!(cache.is_empty());
}

#[test]
fn test_cached_entry_reuses_until_expired() {
    let clock = Arc::new(ManualClock::new());
    let cache = ResultCache::with_clock(clock.clone());
    let launcher = FakeLauncher::counting();
    let e = entry("CachedTime (10:no) /bin/date");

    let first = resolve_entry_line(&e, &cache, &launcher, &options());
    assert_eq!(first, "(date) CachedTime 0 run 1");

    clock.advance(Duration::from_secs(10));
    assert_eq!(resolve_entry_line(&e, &cache, &launcher, &options()), first);
    assert_eq!(launcher.calls(), 1);

    clock.advance(Duration::from_secs(1));
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) CachedTime 0 run 2"
    );
    assert_eq!(launcher.calls(), 2);
}

#[test]
fn test_cached_entry_with_age_suffix() {
    let clock = Arc::new(ManualClock::new());
    let cache = ResultCache::with_clock(clock.clone());
    let launcher = FakeLauncher::counting();
    let e = entry("CachedTimeWithAge (10:yes) /bin/date");

    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) CachedTimeWithAge 0 run 1 (0;10)"
    );

    clock.advance(Duration::from_secs(2));
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) CachedTimeWithAge 0 run 1 (2;10)"
    );

    clock.advance(Duration::from_secs(3));
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) CachedTimeWithAge 0 run 1 (5;10)"
    );

    clock.advance(Duration::from_secs(6));
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) CachedTimeWithAge 0 run 2 (0;10)"
    );
    assert_eq!(launcher.calls(), 2);
}

#[test]
fn test_old_line_is_refreshed_without_recreating() {
    let clock = Arc::new(ManualClock::new());
    let cache = ResultCache::with_clock(clock.clone());
    let launcher = FakeLauncher::counting();
    let e = entry("Cached (1:yes) /bin/date");

    // A pre-existing row keeps its own policy on the Old path
    cache.create_line("Cached", 30, false).unwrap();
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) Cached 0 run 1"
    );
    clock.advance(Duration::from_secs(20));
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) Cached 0 run 1"
    );
    assert_eq!(launcher.calls(), 1);
}

#[test]
fn test_cached_timeout_is_retried_next_time() {
    let launcher = FakeLauncher::new(|req, n| {
        if n == 1 {
            Err(LaunchError::Timeout {
                command: req.command_line.to_string(),
                seconds: 5,
                pid: 1,
            })
        } else {
            Ok(output(0, "late"))
        }
    });
    let cache = ResultCache::new();
    let e = entry("Flaky (60:no) /bin/flaky");

    assert!(resolve_entry_line(&e, &cache, &launcher, &options()).is_empty());
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(flaky) Flaky 0 late"
    );
    assert_eq!(launcher.calls(), 2);
}

/// Poisons its cache on the n-th time reading.
struct PoisonAt {
    calls: AtomicUsize,
    at: usize,
    cache: OnceLock<Weak<ResultCache>>,
}

impl Clock for PoisonAt {
    fn now(&self) -> Instant {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.at {
            if let Some(cache) = self.cache.get().and_then(Weak::upgrade) {
                cache.poison();
            }
        }
        Instant::now()
    }
}

#[test]
fn test_poisoned_cache_still_executes() {
    let cache = ResultCache::new();
    cache.poison();
    let launcher = FakeLauncher::counting();
    let e = entry("CachedTimeWithAge (10:yes) /bin/date");

    // Lookups fail and count as Absent, so every call runs the check
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) CachedTimeWithAge 0 run 1"
    );
    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) CachedTimeWithAge 0 run 2"
    );
    assert_eq!(launcher.calls(), 2);
}

#[test]
fn test_failed_read_back_returns_fresh_line() {
    // Clock reads: lookup, create, update, read back
    let clock = Arc::new(PoisonAt {
        calls: AtomicUsize::new(0),
        at: 4,
        cache: OnceLock::new(),
    });
    let cache = Arc::new(ResultCache::with_clock(clock.clone()));
    clock.cache.set(Arc::downgrade(&cache)).unwrap();
    let launcher = FakeLauncher::counting();
    let e = entry("CachedTimeWithAge (10:yes) /bin/date");

    assert_eq!(
        resolve_entry_line(&e, &cache, &launcher, &options()),
        "(date) CachedTimeWithAge 0 run 1"
    );
    assert_eq!(launcher.calls(), 1);
}
