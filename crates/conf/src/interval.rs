//! Daily wall-clock interval used for alert downtime windows.

use chrono::{DateTime, Duration, NaiveTime, TimeZone};

use crate::error::ConfError;

/// A daily time window: a local start time plus a whole-hour duration.
///
/// Membership is inclusive at both ends, evaluated against the calendar
/// date of the instant being tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    start: NaiveTime,
    hours: i64,
}

impl TimeInterval {
    pub fn new(start: NaiveTime, hours: i64) -> Result<Self, ConfError> {
        if hours <= 0 {
            return Err(ConfError::Interval(format!("{start}+{hours}")));
        }
        Ok(Self { start, hours })
    }

    /// Parse the `HH:mm+H` downtime format.
    pub fn parse(value: &str) -> Result<Self, ConfError> {
        let (time_part, hours_part) = value
            .split_once('+')
            .ok_or_else(|| ConfError::Interval(value.to_string()))?;

        let start = NaiveTime::parse_from_str(time_part.trim(), "%H:%M")
            .map_err(|_| ConfError::Interval(value.to_string()))?;

        let hours: i64 = hours_part
            .trim()
            .parse()
            .map_err(|_| ConfError::Interval(value.to_string()))?;

        Self::new(start, hours)
    }

    /// True when the instant falls inside the window anchored on its own
    /// calendar date.
    pub fn contains<Z: TimeZone>(&self, instant: &DateTime<Z>) -> bool {
        let local_start = instant.date_naive().and_time(self.start);

        let start = match instant.timezone().from_local_datetime(&local_start) {
            chrono::LocalResult::Single(dt) => dt,
            // DST gap or fold: take the earlier mapping.
            chrono::LocalResult::Ambiguous(earliest, _) => earliest,
            chrono::LocalResult::None => return false,
        };

        let end = start.clone() + Duration::hours(self.hours);

        start <= *instant && *instant <= end
    }
}
