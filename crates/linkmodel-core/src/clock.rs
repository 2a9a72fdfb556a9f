//! Clocks and model timezones for timestamp columns.

use crate::value::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time, in microseconds since the Unix epoch (UTC).
pub trait Clock: Send + Sync {
    /// Current instant as UTC microseconds since epoch.
    fn now_micros(&self) -> i64;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX),
            // Clock set before 1970.
            Err(before) => i64::try_from(before.duration().as_micros()).map_or(i64::MIN, |m| -m),
        }
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_micros(&self) -> i64 {
        self.0
    }
}

/// Timezone in which a model records its timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timezone {
    /// Store instants in UTC (`TIMESTAMPTZ`).
    #[default]
    Utc,
    /// Store wall-clock time shifted by a fixed offset from UTC, in seconds.
    FixedOffset(i32),
}

impl Timezone {
    /// Convert a UTC instant into the value stored for a timestamp column.
    pub fn timestamp_value(self, utc_micros: i64) -> Value {
        match self {
            Timezone::Utc => Value::TimestampTz(utc_micros),
            Timezone::FixedOffset(seconds) => {
                Value::Timestamp(utc_micros.saturating_add(i64::from(seconds) * 1_000_000))
            }
        }
    }

    /// Current time in this timezone according to `clock`.
    pub fn now(self, clock: &dyn Clock) -> Value {
        self.timestamp_value(clock.now_micros())
    }
}
