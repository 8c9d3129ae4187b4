//! Alerts for rows that stay commented out past their threshold.

use omicron_conf::ConfigKey;
use omicron_core::Clock;
use omicron_sched::Job;

use crate::alert::{Alert, AlertStatus};
use crate::policy::{alert_for, PolicyKind};

pub(crate) fn generate(job: &Job, clock: &dyn Clock) -> Alert {
    let kind = PolicyKind::CommentedExpression;
    let threshold_minutes = job
        .configuration()
        .int(ConfigKey::SlaCommentedExpressionAlertDelayMinutes);

    let minutes_commented =
        (clock.now_millis() - job.row().read_timestamp_millis()) / 60_000;

    let failed = job.row().is_commented() && minutes_commented > threshold_minutes;

    let message = if failed {
        format!(
            "{} -> row is commented and disabled (commented out for {} minutes; threshold set to {})",
            kind.name(),
            minutes_commented,
            threshold_minutes
        )
    } else {
        format!("{} -> expression uncommented and scheduled to run", kind.name())
    };

    let status = if failed { AlertStatus::Failure } else { AlertStatus::Success };

    alert_for(job, kind, message, status)
}
