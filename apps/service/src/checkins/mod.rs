//! Checkins: dead-man's switches that external agents must hit periodically.

pub mod watchdog;

pub use watchdog::CheckinWatchdog;

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Lateness of a hit in microseconds, measured against the moment it was due
///
/// The first hit of a checkin is never late. Lateness beyond
/// `period + latency seconds` is treated as noise and reported as zero, and
/// early hits report zero rather than a negative number.
pub fn hit_latency(previous: Option<DateTime<Utc>>, current: DateTime<Utc>, period: Duration) -> i64 {
    let Some(previous) = previous else {
        return 0;
    };

    let period_us = period.as_micros() as i128;
    let due = previous.timestamp_micros() as i128 + period_us;
    let mut latency = current.timestamp_micros() as i128 - due;
    if latency > period_us + latency.saturating_mul(1_000_000) {
        latency = 0;
    }
    latency.clamp(0, i64::MAX as i128) as i64
}
