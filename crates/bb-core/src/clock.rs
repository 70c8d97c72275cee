//! # Clocks
//!
//! Time sources for ids and timestamps. The board stores dates to the
//! minute, so `minute_precision` is applied before anything is persisted.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Timelike, Utc};
use std::sync::Mutex;

use crate::traits::Clock;

/// Reads the host's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to. Used to make ids and timestamps
/// deterministic in tests and seeding.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Starts at the given microseconds since the Unix epoch.
    pub fn at_micros(micros: i64) -> Self {
        let utc = Utc.timestamp_micros(micros).single().unwrap_or_default();
        Self::new(utc.with_timezone(&Local))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drops seconds and below: the persisted date layout stops at minutes.
pub fn minute_precision(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(at)
}
