//! Alerts for jobs that have gone too long without a successful run.

use omicron_conf::ConfigKey;
use omicron_core::clock::zoned;
use omicron_core::Clock;
use omicron_exec::{TaskLogEntry, TaskStatus};
use omicron_sched::Job;

use crate::alert::{Alert, AlertLogEntry, AlertStatus};
use crate::policy::{alert_for, not_applicable, PolicyKind};

/// Statuses that count as observable activity for this policy; `Skipped`
/// entries say nothing about the command itself.
const STATUS_FILTER: [TaskStatus; 4] = [
    TaskStatus::Complete,
    TaskStatus::Error,
    TaskStatus::FailedStart,
    TaskStatus::Started,
];

pub(crate) fn generate(job: &Job, last: Option<&AlertLogEntry>, clock: &dyn Clock) -> Alert {
    let kind = PolicyKind::TimeSinceLastSuccess;

    // A row that cannot run, or a retired instance, has no meaningful
    // success window.
    if !job.is_runnable() || !job.is_active() {
        return not_applicable(job, kind);
    }

    let log_view = job.filtered_log(&STATUS_FILTER);

    let Some(newest) = log_view.last() else {
        return not_applicable(job, kind);
    };

    // A trailing Complete is an immediate success; this also avoids false
    // alerts across gaps in the schedule.
    if newest.status() == TaskStatus::Complete {
        return build(job, newest, AlertStatus::Success, clock);
    }

    // Already alerted since the last observable activity: stay quiet until
    // something new happens.
    if alerted_since_last_activity(newest.timestamp_millis(), last) {
        return not_applicable(job, kind);
    }

    let latest_complete = log_view
        .iter()
        .rev()
        .find(|entry| entry.status() == TaskStatus::Complete);

    // A run is in flight and there is recent success history: wait for the
    // final status rather than alerting into a likely recovery.
    if newest.status() == TaskStatus::Started && latest_complete.is_some() {
        return not_applicable(job, kind);
    }

    let threshold_minutes = job.configuration().int(ConfigKey::SlaMinutesSinceSuccess);

    let baseline = latest_complete.unwrap_or_else(|| {
        log_view.first().expect("log view is non-empty here")
    });

    let minutes_incomplete = (clock.now_millis() - baseline.timestamp_millis()) / 60_000;

    let status = if minutes_incomplete <= threshold_minutes {
        AlertStatus::Success
    } else {
        AlertStatus::Failure
    };

    build(job, baseline, status, clock)
}

fn alerted_since_last_activity(last_activity_millis: i64, last: Option<&AlertLogEntry>) -> bool {
    last.is_some_and(|entry| {
        entry.status == AlertStatus::Failure && entry.timestamp_millis > last_activity_millis
    })
}

fn build(job: &Job, baseline: &TaskLogEntry, status: AlertStatus, clock: &dyn Clock) -> Alert {
    let kind = PolicyKind::TimeSinceLastSuccess;
    let zone = job.configuration().timezone();
    let threshold = job.configuration().int(ConfigKey::SlaMinutesSinceSuccess);
    let minutes_ago = (clock.now_millis() - baseline.timestamp_millis()) / 60_000;

    let preamble = if baseline.status() == TaskStatus::Complete {
        "last complete run was at"
    } else {
        "no successful runs. Scheduled since"
    };

    let message = format!(
        "{} -> {} {} ({} minutes ago; threshold set to {})",
        kind.name(),
        preamble,
        zoned(baseline.timestamp_millis(), zone).format("%Y%m%d %H:%M %Z"),
        minutes_ago,
        threshold
    );

    alert_for(job, kind, message, status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use omicron_conf::Configuration;
    use omicron_core::ManualClock;
    use omicron_crontab::CrontabRow;
    use omicron_exec::ProcFs;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    // The policy reads only the job's filtered log, so the tests drive a
    // real job whose children fail fast (bogus su path keeps every launch a
    // FailedStart regardless of the test host).
    fn config(threshold: i64) -> Configuration {
        let mut overrides = BTreeMap::new();
        overrides.insert(ConfigKey::SlaMinutesSinceSuccess, threshold.to_string());
        Configuration::defaults().with_overrides(&overrides)
    }

    fn runnable_job(clock: &Arc<ManualClock>, threshold: i64) -> Job {
        let row = CrontabRow::parse(1, "* * * * * root probe", clock.now_millis());
        Job::new(
            row,
            "probe",
            config(threshold),
            Arc::new(ProcFs),
            Arc::clone(clock) as _,
        )
    }

    #[tokio::test]
    async fn empty_log_is_not_applicable() {
        let clock = Arc::new(ManualClock::at_utc(2015, 1, 1, 8, 0));
        let job = runnable_job(&clock, 60);

        let alert = generate(&job, None, clock.as_ref());
        assert_eq!(alert.status, AlertStatus::NotApplicable);
    }

    #[tokio::test]
    async fn started_only_log_counts_from_first_entry() {
        let clock = Arc::new(ManualClock::at_utc(2015, 1, 1, 8, 0));
        let mut job = runnable_job(&clock, 30);

        // Launch once; without yielding the task stays unswept, leaving a
        // single Started entry in the log.
        assert!(job.run());

        clock.advance_minutes(10);
        let alert = generate(&job, None, clock.as_ref());
        assert_eq!(alert.status, AlertStatus::Success);
        assert!(alert.message.contains("no successful runs"));

        clock.advance_minutes(40);
        let alert = generate(&job, None, clock.as_ref());
        assert_eq!(alert.status, AlertStatus::Failure);
    }

    #[tokio::test]
    async fn failure_suppressed_until_new_activity() {
        let clock = Arc::new(ManualClock::at_utc(2015, 1, 1, 8, 0));
        let mut job = runnable_job(&clock, 10);

        assert!(job.run());
        clock.advance_minutes(30);

        let jobs = vec![job];
        let mut policy = Policy::new(PolicyKind::TimeSinceLastSuccess);

        let alerts = policy.evaluate(&jobs, clock.as_ref());
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_failure());

        // Long after the repeat delay, with no new log activity, the
        // "already alerted" guard keeps the policy quiet.
        clock.advance_minutes(120);
        assert!(policy.evaluate(&jobs, clock.as_ref()).is_empty());
    }

    #[tokio::test]
    async fn non_runnable_rows_are_not_applicable() {
        let clock = Arc::new(ManualClock::at_utc(2015, 1, 1, 8, 0));
        let row = CrontabRow::parse(1, "# * * * * * root x", clock.now_millis());
        let job = Job::new(row, "x", config(60), Arc::new(ProcFs), Arc::clone(&clock) as _);

        assert_eq!(
            generate(&job, None, clock.as_ref()).status,
            AlertStatus::NotApplicable
        );
    }
}
