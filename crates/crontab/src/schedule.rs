//! Numerical run-time whitelists produced from a parsed expression.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Timelike};
use chrono_tz::Tz;

/// The five whitelists of a cron schedule.
///
/// A local time satisfies the schedule iff every calendar component is a
/// member of its set. Sunday is always normalised to 0 before the sets are
/// built, so membership tests never see a 7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
}

impl Schedule {
    pub(crate) fn new(
        minutes: BTreeSet<u32>,
        hours: BTreeSet<u32>,
        days_of_month: BTreeSet<u32>,
        months: BTreeSet<u32>,
        days_of_week: BTreeSet<u32>,
    ) -> Self {
        Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
        }
    }

    pub fn minutes(&self) -> &BTreeSet<u32> {
        &self.minutes
    }

    pub fn hours(&self) -> &BTreeSet<u32> {
        &self.hours
    }

    pub fn days_of_month(&self) -> &BTreeSet<u32> {
        &self.days_of_month
    }

    pub fn months(&self) -> &BTreeSet<u32> {
        &self.months
    }

    pub fn days_of_week(&self) -> &BTreeSet<u32> {
        &self.days_of_week
    }

    /// Whether the given local time is whitelisted by this schedule.
    pub fn matches(&self, local: &DateTime<Tz>) -> bool {
        self.days_of_week.contains(&local.weekday().num_days_from_sunday())
            && self.months.contains(&local.month())
            && self.days_of_month.contains(&local.day())
            && self.hours.contains(&local.hour())
            && self.minutes.contains(&local.minute())
    }

    /// The next whitelisted calendar minute strictly after `local`.
    ///
    /// Scans at minute granularity for up to a year; a schedule whose sets
    /// are non-empty but jointly unsatisfiable (e.g. Feb 30) yields `None`.
    pub fn next_run_after(&self, local: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut candidate = local
            .with_second(0)
            .and_then(|dt| dt.with_nanosecond(0))
            .unwrap_or_else(|| local.clone())
            + Duration::minutes(1);

        for _ in 0..(366 * 24 * 60) {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }

        None
    }
}
