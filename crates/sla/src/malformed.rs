//! Alerts for rows that cannot be parsed and stay that way.

use omicron_conf::ConfigKey;
use omicron_core::Clock;
use omicron_sched::Job;

use crate::alert::{Alert, AlertStatus};
use crate::policy::{alert_for, PolicyKind};

pub(crate) fn generate(job: &Job, clock: &dyn Clock) -> Alert {
    let kind = PolicyKind::MalformedExpression;
    let threshold_minutes = job
        .configuration()
        .int(ConfigKey::SlaMalformedExpressionAlertDelayMinutes);

    let minutes_malformed =
        (clock.now_millis() - job.row().read_timestamp_millis()) / 60_000;

    let failed = job.row().is_malformed() && minutes_malformed > threshold_minutes;

    let message = if failed {
        format!(
            "{} -> row is uncommented but cannot be run due to syntax error (malformed for {} minutes; threshold set to {})",
            kind.name(),
            minutes_malformed,
            threshold_minutes
        )
    } else {
        format!("{} -> expression is valid and scheduled to run", kind.name())
    };

    let status = if failed { AlertStatus::Failure } else { AlertStatus::Success };

    alert_for(job, kind, message, status)
}
