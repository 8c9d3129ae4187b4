//! Wall-clock abstraction.
//!
//! Every time read in the supervisor goes through [`Clock`] so that the
//! scheduler loop, job evaluation, and alert policies can be driven
//! minute-by-minute in tests with [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Millisecond wall-clock reader.
pub trait Clock: Send + Sync {
    /// Current UTC epoch time in milliseconds.
    fn now_millis(&self) -> i64;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Test clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    /// Create a clock pinned to a specific UTC calendar time.
    pub fn at_utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let dt = Utc
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
        Self::new(dt.timestamp_millis())
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance_millis(minutes * 60_000);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Interpret a millisecond UTC timestamp in the given time zone.
pub fn zoned(millis: i64, tz: Tz) -> DateTime<Tz> {
    match Utc.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&tz),
        // Out-of-range millis only occur with corrupted input; clamp to epoch.
        _ => Utc.timestamp_millis_opt(0).unwrap().with_timezone(&tz),
    }
}

/// Truncate a millisecond timestamp to the start of its calendar minute,
/// optionally advanced by whole minutes.
pub fn minute_floor(millis: i64, plus_minutes: i64) -> i64 {
    (millis / 60_000) * 60_000 + plus_minutes * 60_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance_minutes(2);
        assert_eq!(clock.now_millis(), 121_000);
    }

    #[test]
    fn minute_floor_truncates() {
        // 90_500 ms = 1 minute 30.5 seconds
        assert_eq!(minute_floor(90_500, 0), 60_000);
        assert_eq!(minute_floor(90_500, 1), 120_000);
        assert_eq!(minute_floor(60_000, 0), 60_000);
    }

    #[test]
    fn zoned_respects_timezone() {
        let clock = ManualClock::at_utc(2015, 6, 1, 12, 0);
        let la = clock.now_millis();
        let dt = zoned(la, chrono_tz::America::Los_Angeles);
        // PDT is UTC-7 in June.
        assert_eq!(dt.format("%H:%M").to_string(), "05:00");
    }
}
