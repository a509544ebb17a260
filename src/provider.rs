//! The MRPE section provider
//!
//! Owns the directive lists, the resolved entries and the result cache.
//! Entries are rebuilt on every [`MrpeProvider::load_config`]; the cache
//! lives as long as the provider, so cached lines survive reloads.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::cache::ResultCache;
use crate::config::MrpeConfig;
use crate::entry::{
    is_valid_regular_file, parse_directive_line, parse_include_file, CheckEntry, Directive,
    IncludeDirective,
};
use crate::exec::{resolve_entry_line, ExecOptions};
use crate::markers::Markers;
use crate::process::{ProcessLauncher, SystemLauncher};

/// First line of the section, identifies the format to the collector
pub const SECTION_HEADER: &str = "<<<mrpe>>>";

/// Build-time policy: drop entries whose executable is not a regular file
pub const DROP_MISSING_EXECUTABLES: bool = cfg!(feature = "drop-missing-executables");

pub struct MrpeProvider {
    enabled: bool,
    timeout: Duration,
    parallel: bool,
    log_output: bool,
    max_workers: usize,
    drop_missing: bool,
    markers: Markers,
    checks: Vec<String>,
    includes: Vec<IncludeDirective>,
    entries: Vec<CheckEntry>,
    cache: ResultCache,
    launcher: Box<dyn ProcessLauncher>,
}

impl MrpeProvider {
    pub fn new() -> Self {
        Self::with_launcher(Box::new(SystemLauncher))
    }

    pub fn with_launcher(launcher: Box<dyn ProcessLauncher>) -> Self {
        let defaults = MrpeConfig::default();
        Self {
            enabled: defaults.enabled,
            timeout: defaults.timeout(),
            parallel: defaults.parallel,
            log_output: defaults.log_output,
            max_workers: defaults.worker_limit(),
            drop_missing: DROP_MISSING_EXECUTABLES,
            markers: defaults.markers(),
            checks: Vec::new(),
            includes: Vec::new(),
            entries: Vec::new(),
            cache: ResultCache::new(),
            launcher,
        }
    }

    /// Replace the result cache, e.g. with one driven by a manual clock.
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = cache;
        self
    }

    /// Override the build-time missing-executable policy.
    pub fn with_drop_missing(mut self, drop_missing: bool) -> Self {
        self.drop_missing = drop_missing;
        self
    }

    /// Apply settings and rebuild all entries from `config`.
    pub fn load_config(&mut self, config: &MrpeConfig) {
        self.enabled = config.enabled;
        self.timeout = config.timeout();
        self.parallel = config.parallel;
        self.log_output = config.log_output;
        self.max_workers = config.worker_limit();
        self.markers = config.markers();

        self.parse_directives(&config.config);
        self.load_entries();
    }

    /// Sort directives into checks and includes, dropping invalid ones.
    fn parse_directives(&mut self, directives: &[String]) {
        self.checks.clear();
        self.includes.clear();
        self.entries.clear();

        if directives.is_empty() {
            trace!("nothing to exec in the mrpe");
            return;
        }

        for raw in directives {
            match parse_directive_line(raw, &self.markers) {
                Ok(Directive::Check(spec)) => self.checks.push(spec),
                Ok(Directive::Include(include)) => self.includes.push(include),
                Err(e) => debug!("{e}"),
            }
        }
    }

    /// Rebuild the entry list from the parsed checks and includes.
    pub fn load_entries(&mut self) {
        self.entries.clear();

        for spec in &self.checks {
            match CheckEntry::parse("", spec, &self.markers) {
                Ok(entry) => self.entries.push(entry),
                Err(e) => warn!("{e}"),
            }
        }

        for include in &self.includes {
            let path = Path::new(&include.path);
            if !is_valid_regular_file(path) {
                debug!("File '{}' is not valid or missing for include", path.display());
                continue;
            }
            parse_include_file(&include.user, path, &self.markers, &mut self.entries);
        }

        if self.drop_missing {
            self.entries.retain(|entry| {
                let ok = is_valid_regular_file(Path::new(&entry.exe_path));
                if !ok {
                    debug!("The file '{}' is not valid", entry.exe_path);
                }
                ok
            });
        }

        info!(
            entries = self.entries.len(),
            checks = self.checks.len(),
            includes = self.includes.len(),
            "mrpe configuration loaded"
        );
    }

    /// Run every entry and join the non-empty lines, each newline-terminated.
    ///
    /// Sequential runs keep entry order. Parallel runs use at most
    /// `max_workers` threads and give no ordering guarantee.
    pub fn produce_report(&self, timeout: Duration, parallel: bool) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let options = ExecOptions {
            timeout,
            log_output: self.log_output,
        };

        if parallel {
            self.produce_parallel(&options)
        } else {
            let mut out = String::new();
            for entry in &self.entries {
                push_line(&mut out, &self.resolve(entry, &options));
            }
            out
        }
    }

    fn produce_parallel(&self, options: &ExecOptions) -> String {
        let workers = self.max_workers.clamp(1, self.entries.len());
        let next = AtomicUsize::new(0);
        let out = Mutex::new(String::new());

        thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| {
                    while let Some(entry) = self.entries.get(next.fetch_add(1, Ordering::SeqCst))
                    {
                        let line = self.resolve(entry, options);
                        let mut out = out.lock().unwrap_or_else(|e| e.into_inner());
                        push_line(&mut out, &line);
                    }
                });
            }
        });

        out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn resolve(&self, entry: &CheckEntry, options: &ExecOptions) -> String {
        resolve_entry_line(entry, &self.cache, self.launcher.as_ref(), options)
    }

    /// The full section: header plus body, or nothing when disabled or empty.
    pub fn generate_section(&self) -> String {
        if !self.enabled {
            return String::new();
        }
        let body = self.produce_report(self.timeout, self.parallel);
        if body.is_empty() {
            return String::new();
        }
        format!("{SECTION_HEADER}\n{body}")
    }

    pub fn entries(&self) -> &[CheckEntry] {
        &self.entries
    }

    pub fn checks(&self) -> &[String] {
        &self.checks
    }

    pub fn includes(&self) -> &[IncludeDirective] {
        &self.includes
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for MrpeProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Timed-out entries produce no line at all.
fn push_line(out: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    out.push_str(line);
    out.push('\n');
}
