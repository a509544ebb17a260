//! Time-bounded cache of formatted MRPE result lines
//!
//! Keys are check descriptions. A line is `Ready` while its age is at most
//! its `max_age`, and `Old` once it is older or has never been filled.
//!
//! Each operation takes the internal lock on its own, so a lookup followed
//! by an update is not atomic: two callers that both see `Absent` will both
//! execute the check and the last `update_line` wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::CacheError;

/// Source of monotonic time for the cache.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Freshness of a cached line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Never created
    Absent,
    /// Created but empty, or older than `max_age`
    Old,
    /// Filled and within `max_age`
    Ready,
}

#[derive(Debug, Clone)]
struct CacheLine {
    data: String,
    captured_at: Instant,
    max_age: u64,
    add_age: bool,
}

/// Result cache owned by the provider for its whole lifetime.
pub struct ResultCache {
    lines: Mutex<HashMap<String, CacheLine>>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            lines: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CacheLine>>, CacheError> {
        self.lines.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Insert an empty line for `key`, replacing any existing one.
    pub fn create_line(&self, key: &str, max_age: u64, add_age: bool) -> Result<(), CacheError> {
        let now = self.clock.now();
        self.lock()?.insert(
            key.to_string(),
            CacheLine {
                data: String::new(),
                captured_at: now,
                max_age,
                add_age,
            },
        );
        Ok(())
    }

    /// Store `data` for an existing key and restart its age.
    pub fn update_line(&self, key: &str, data: &str) -> Result<(), CacheError> {
        let now = self.clock.now();
        let mut lines = self.lock()?;
        let line = lines
            .get_mut(key)
            .ok_or_else(|| CacheError::UnknownKey(key.to_string()))?;
        line.data = data.to_string();
        line.captured_at = now;
        Ok(())
    }

    /// Look up `key`, returning the text to report and its freshness.
    ///
    /// With `add_age` set, the text carries a ` (<age>;<max_age>)` suffix.
    pub fn get_line_data(&self, key: &str) -> Result<(String, LineState), CacheError> {
        let now = self.clock.now();
        let lines = self.lock()?;
        let Some(line) = lines.get(key) else {
            return Ok((String::new(), LineState::Absent));
        };

        if line.data.is_empty() {
            return Ok((String::new(), LineState::Old));
        }

        let age = now.saturating_duration_since(line.captured_at).as_secs();
        let state = if age <= line.max_age {
            LineState::Ready
        } else {
            LineState::Old
        };

        let text = if line.add_age {
            format!("{} ({};{})", line.data, age, line.max_age)
        } else {
            line.data.clone()
        };

        Ok((text, state))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|lines| lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Poison the internal lock the way a panicking holder would.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _lines = self.lines.lock();
            panic!("poisoning the result cache lock");
        }));
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache").field("lines", &self.len()).finish()
    }
}
