// src/core/clock.rs

//! Monotonic timestamps for connection activity and the sweep schedule.
//!
//! Every lifecycle operation takes an explicit `now` so that the timing rules
//! can be exercised deterministically. Only the runtime reads a real clock.

use std::fmt;
use std::ops::Add;
use std::time::{Duration, Instant};

/// A point in time, measured as an offset from a clock's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// The clock origin. The registry's sweep clock starts here.
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub const fn from_duration(offset: Duration) -> Self {
        Self(offset)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// The offset of this timestamp from the clock origin.
    pub const fn as_duration(self) -> Duration {
        self.0
    }

    /// Returns the time elapsed from `earlier` to `self`, or zero if `earlier`
    /// is actually later.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{:.3}s", self.0.as_secs_f64())
    }
}

/// A source of non-decreasing timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// A `Clock` backed by `std::time::Instant`, with its origin at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.origin.elapsed())
    }
}
