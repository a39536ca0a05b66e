//! Time sources.
//!
//! The engine never reads the wall clock directly. It asks a [`Clock`] so that
//! accrual can be replayed deterministically in tests and from the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source of the current Unix timestamp in seconds
pub trait Clock {
    /// Current time in seconds since the Unix epoch
    fn now(&self) -> u64;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualClock {
    now: u64,
}

impl ManualClock {
    /// Create a clock frozen at `now`
    pub fn new(now: u64) -> Self {
        Self { now }
    }

    /// Jump to an absolute timestamp. Moving backwards is allowed; accrual ignores it.
    pub fn set(&mut self, now: u64) {
        self.now = now;
    }

    /// Move forward by `secs`
    pub fn advance(&mut self, secs: u64) {
        self.now = self.now.saturating_add(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// Render a Unix timestamp as RFC 3339, falling back to the raw number
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
