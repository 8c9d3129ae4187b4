//! Batches policy alerts into one email per tick and dispatches it on a
//! background worker.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use omicron_conf::{ConfigKey, Configuration};
use omicron_core::host::short_hostname;
use omicron_core::Clock;
use omicron_sched::Job;
use omicron_sla::{Alert, Policy};

use crate::email::EmailNotifier;
use crate::traits::{Notifier, NotifyError, OutboundEmail};

type SharedNotifier = Arc<RwLock<Arc<dyn Notifier>>>;

/// Evaluates the SLA policies each tick and owns the dispatch worker.
///
/// The worker sits behind a one-slot queue: at most one batch waits while a
/// send is in flight, and an overloaded relay sheds batches rather than
/// stalling the scheduler.
pub struct AlertManager {
    policies: Vec<Policy>,
    notifier: SharedNotifier,
    outbound: mpsc::Sender<OutboundEmail>,
    hostname: String,
    clock: Arc<dyn Clock>,
}

impl AlertManager {
    pub fn new(configuration: &Configuration, clock: Arc<dyn Clock>) -> Result<AlertManager, NotifyError> {
        let notifier: Arc<dyn Notifier> = Arc::new(EmailNotifier::from_config(configuration)?);
        let notifier: SharedNotifier = Arc::new(RwLock::new(notifier));

        let (outbound, inbox) = mpsc::channel(1);
        spawn_dispatcher(inbox, Arc::clone(&notifier));

        Ok(AlertManager {
            policies: Policy::default_set(),
            notifier,
            outbound,
            hostname: short_hostname(),
            clock,
        })
    }

    /// Rebuild the delivery channel after a config reload. Policy state
    /// survives the reload so alerts are not re-triggered.
    pub fn update_configuration(&mut self, configuration: &Configuration) -> Result<(), NotifyError> {
        let rebuilt: Arc<dyn Notifier> = Arc::new(EmailNotifier::from_config(configuration)?);
        match self.notifier.write() {
            Ok(mut guard) => *guard = rebuilt,
            Err(poisoned) => *poisoned.into_inner() = rebuilt,
        }
        Ok(())
    }

    /// Evaluate every policy over the current job set and enqueue one
    /// batched email when anything actionable came out.
    pub fn send_alerts(&mut self, jobs: &[Job]) {
        let mut alerts: Vec<Alert> = Vec::new();
        for policy in &mut self.policies {
            alerts.extend(policy.evaluate(jobs, self.clock.as_ref()));
        }

        if alerts.is_empty() {
            return;
        }

        // Per-job config decides whether its alerts may go to email at all.
        let email_enabled: HashMap<u64, bool> = jobs
            .iter()
            .map(|job| (job.job_id(), job.configuration().flag(ConfigKey::AlertEmailEnabled)))
            .collect();

        let (to_send, cleared): (Vec<Alert>, Vec<Alert>) = alerts
            .into_iter()
            .partition(|alert| email_enabled.get(&alert.job_id).copied().unwrap_or(false));

        if !cleared.is_empty() {
            warn!(
                count = cleared.len(),
                "unsent policy alerts cleared due to disabled email alerting"
            );
        }

        if to_send.is_empty() {
            return;
        }

        let email = self.build_email(to_send);

        // try_send keeps the scheduler tick non-blocking; a full slot means
        // the relay is already behind and this batch is shed.
        if self.outbound.try_send(email).is_err() {
            warn!("alert dispatcher is busy, dropping this alert batch");
        }
    }

    fn build_email(&self, mut alerts: Vec<Alert>) -> OutboundEmail {
        alerts.sort_by(|a, b| {
            a.raw_expression
                .cmp(&b.raw_expression)
                .then_with(|| a.policy_name.cmp(b.policy_name))
                .then_with(|| a.message.cmp(&b.message))
        });

        let failures = alerts.iter().filter(|alert| alert.is_failure()).count();
        let successes = alerts.len() - failures;

        let mut subject = format!("[OMICRON ALERT: {}]", self.hostname);
        if failures > 0 {
            subject.push_str(&format!(" failures: {failures}"));
        }
        if successes > 0 {
            subject.push_str(&format!(" successes: {successes}"));
        }

        let mut body =
            String::from("Alerts are listed in order of crontab command and alert timestamp\n\n");

        let mut current_expression: Option<&str> = None;
        for alert in &alerts {
            if current_expression != Some(alert.raw_expression.as_str()) {
                body.push_str(&alert.raw_expression);
                body.push_str("\n\n");
                current_expression = Some(alert.raw_expression.as_str());
            }

            body.push_str(if alert.is_failure() { "FAIL: " } else { "SUCCESS: " });
            body.push_str(&alert.message);
            body.push('\n');
        }

        body.push_str("\nSincerely,\nOmicron <3");

        info!(failures, successes, "queueing alert email");

        OutboundEmail { subject, body }
    }
}

fn spawn_dispatcher(mut inbox: mpsc::Receiver<OutboundEmail>, notifier: SharedNotifier) {
    tokio::spawn(async move {
        while let Some(email) = inbox.recv().await {
            let current = match notifier.read() {
                Ok(guard) => Arc::clone(&guard),
                Err(poisoned) => Arc::clone(&poisoned.into_inner()),
            };

            if let Err(e) = current.send(&email).await {
                // Delivery is best-effort: log and drop, never retry.
                error!(channel = current.channel_name(), error = %e, "failed to send alerts");
            }
        }
    });
}
