//! The shared policy evaluation harness.

use std::collections::HashMap;

use tracing::info;

use omicron_conf::ConfigKey;
use omicron_core::clock::zoned;
use omicron_core::Clock;
use omicron_sched::Job;

use crate::alert::{Alert, AlertLogEntry, AlertStatus};
use crate::{commented, malformed, time_since_success};

/// The closed set of SLA policies.
///
/// A small fixed family, so tagged variants with one evaluation harness
/// beat a trait object here; per-policy alert state lives in [`Policy`],
/// not in the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    TimeSinceLastSuccess,
    CommentedExpression,
    MalformedExpression,
}

impl PolicyKind {
    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::TimeSinceLastSuccess => "Time_Since_Success",
            PolicyKind::CommentedExpression => "Commented_Expression",
            PolicyKind::MalformedExpression => "Malformed_Expression",
        }
    }

    /// A threshold of -1 disables the policy for a job.
    fn is_disabled(self, job: &Job) -> bool {
        let key = match self {
            PolicyKind::TimeSinceLastSuccess => ConfigKey::SlaMinutesSinceSuccess,
            PolicyKind::CommentedExpression => ConfigKey::SlaCommentedExpressionAlertDelayMinutes,
            PolicyKind::MalformedExpression => ConfigKey::SlaMalformedExpressionAlertDelayMinutes,
        };
        job.configuration().int(key) == -1
    }

    fn generate(
        self,
        job: &Job,
        last: Option<&AlertLogEntry>,
        clock: &dyn Clock,
    ) -> Alert {
        match self {
            PolicyKind::TimeSinceLastSuccess => time_since_success::generate(job, last, clock),
            PolicyKind::CommentedExpression => commented::generate(job, clock),
            PolicyKind::MalformedExpression => malformed::generate(job, clock),
        }
    }
}

/// Build an alert carcass for a job; the policy modules fill in message
/// and status.
pub(crate) fn alert_for(job: &Job, kind: PolicyKind, message: String, status: AlertStatus) -> Alert {
    Alert {
        policy_name: kind.name(),
        message,
        status,
        job_id: job.job_id(),
        line_number: job.row().line_number(),
        raw_expression: job.row().raw_expression().to_string(),
        command_line: job.command_line().to_string(),
    }
}

pub(crate) fn not_applicable(job: &Job, kind: PolicyKind) -> Alert {
    alert_for(job, kind, String::new(), AlertStatus::NotApplicable)
}

/// One policy plus its per-job emission history.
pub struct Policy {
    kind: PolicyKind,
    last_alert_log: HashMap<u64, AlertLogEntry>,
}

impl Policy {
    pub fn new(kind: PolicyKind) -> Policy {
        Policy {
            kind,
            last_alert_log: HashMap::new(),
        }
    }

    /// The standard trio in evaluation order.
    pub fn default_set() -> Vec<Policy> {
        vec![
            Policy::new(PolicyKind::TimeSinceLastSuccess),
            Policy::new(PolicyKind::CommentedExpression),
            Policy::new(PolicyKind::MalformedExpression),
        ]
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Evaluate every job and return the actionable alerts.
    ///
    /// Applies the shared rules: inactive jobs are skipped silently,
    /// disabled and in-downtime jobs are skipped with a log line, repeated
    /// successes are suppressed, failures respect the per-job repeat delay,
    /// and a first-ever observation only emits when it is a failure.
    pub fn evaluate(&mut self, jobs: &[Job], clock: &dyn Clock) -> Vec<Alert> {
        let mut outbox = Vec::new();

        for job in jobs {
            if !job.is_active() {
                continue;
            }

            if self.kind.is_disabled(job) {
                info!(
                    policy = self.kind.name(),
                    line = job.row().line_number(),
                    "sla policy disabled for row"
                );
                continue;
            }

            if in_downtime(job, clock) {
                info!(line = job.row().line_number(), "in sla downtime for row");
                continue;
            }

            let last = self.last_alert_log.get(&job.job_id());
            let alert = self.kind.generate(job, last, clock);

            if alert.status == AlertStatus::NotApplicable {
                continue;
            }

            match last {
                Some(entry) => {
                    // Success after success is noise.
                    if alert.status == AlertStatus::Success && entry.status == AlertStatus::Success
                    {
                        continue;
                    }

                    // Failures repeat no faster than the configured delay.
                    if alert.status == AlertStatus::Failure && self.within_repeat_delay(entry, job, clock) {
                        continue;
                    }
                }
                None => {
                    // Nothing was ever emitted: a leading success would just
                    // be bootstrap noise.
                    if alert.status != AlertStatus::Failure {
                        continue;
                    }
                }
            }

            self.last_alert_log.insert(
                job.job_id(),
                AlertLogEntry {
                    job_id: job.job_id(),
                    status: alert.status,
                    timestamp_millis: clock.now_millis(),
                },
            );

            outbox.push(alert);
        }

        // Emission history for jobs that disappeared is dead weight.
        let live_ids: std::collections::HashSet<u64> =
            jobs.iter().map(|job| job.job_id()).collect();
        self.last_alert_log.retain(|job_id, _| live_ids.contains(job_id));

        outbox
    }

    fn within_repeat_delay(&self, entry: &AlertLogEntry, job: &Job, clock: &dyn Clock) -> bool {
        let delay_minutes = job.configuration().int(ConfigKey::AlertMinutesDelayRepeat);
        clock.now_millis() - entry.timestamp_millis <= delay_minutes * 60_000
    }
}

fn in_downtime(job: &Job, clock: &dyn Clock) -> bool {
    match job.configuration().downtime() {
        Ok(Some(interval)) => {
            let now = zoned(clock.now_millis(), job.configuration().timezone());
            interval.contains(&now)
        }
        // Malformed downtime was warned about at config load; treat as none.
        Ok(None) | Err(_) => false,
    }
}
