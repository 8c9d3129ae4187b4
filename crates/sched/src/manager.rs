//! Reconciles the job set against crontab reloads and drives the
//! per-minute evaluation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info};

use omicron_conf::Configuration;
use omicron_core::Clock;
use omicron_crontab::{substitute, Crontab};
use omicron_exec::ProcessHierarchy;

use crate::job::Job;

/// Snapshot of one per-minute evaluation pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    /// Jobs evaluated this tick, retired ones included.
    pub evaluated: usize,
    /// Tasks actually launched.
    pub launched: usize,
    /// Wall time the evaluation took.
    pub elapsed_ms: u64,
}

/// Owner of every live and retired [`Job`].
pub struct JobManager {
    jobs: Vec<Job>,
    hierarchy: Arc<dyn ProcessHierarchy>,
    clock: Arc<dyn Clock>,
}

impl JobManager {
    pub fn new(
        configuration: &Configuration,
        crontab: &Crontab,
        hierarchy: Arc<dyn ProcessHierarchy>,
        clock: Arc<dyn Clock>,
    ) -> JobManager {
        let mut manager = JobManager {
            jobs: Vec::new(),
            hierarchy,
            clock,
        };
        manager.update_configuration(configuration, crontab);
        manager
    }

    /// Three-way reconcile of the current job set against a reloaded
    /// crontab.
    ///
    /// Unchanged jobs (same row identity under an equal configuration) carry
    /// their instance across the reload, keeping their task log and run
    /// counters. Removed jobs with children still running are retired: they
    /// stay in the set, inactive, until their tasks drain.
    pub fn update_configuration(&mut self, configuration: &Configuration, crontab: &Crontab) {
        let mut existing = std::mem::take(&mut self.jobs);
        let mut result: Vec<Job> = Vec::with_capacity(crontab.rows().len());

        let mut carried = 0usize;
        let mut created = 0usize;

        for row in crontab.rows() {
            let effective = crontab
                .override_for(row.line_number())
                .unwrap_or(configuration);

            let command = substitute(row.command(), crontab.variables());

            if let Some(index) = existing
                .iter()
                .position(|job| job.same_identity(row, effective))
            {
                let mut job = existing.swap_remove(index);
                if !job.is_active() {
                    // A removed-then-re-added row revives its old instance,
                    // run counters and all.
                    info!(job = %job, "cron update: reactivating");
                    job.set_active(true);
                }
                carried += 1;
                result.push(job);
            } else {
                created += 1;
                result.push(Job::new(
                    row.clone(),
                    command,
                    effective.clone(),
                    Arc::clone(&self.hierarchy),
                    Arc::clone(&self.clock),
                ));
            }
        }

        info!(count = existing.len(), "cron update: tasks no longer scheduled or out of date");
        info!(count = carried, "cron update: tasks unchanged");
        info!(count = created, "cron update: tasks new or updated");

        // Removed jobs with live children are kept inactive until drained.
        for mut job in existing {
            if job.is_running() {
                job.set_active(false);
                result.push(job);
            }
        }

        self.jobs = result;
    }

    /// Evaluate every job once for the current calendar minute.
    ///
    /// A panic inside one job's evaluation must not block the others, so
    /// each call is isolated; drained retired jobs are dropped afterwards.
    pub fn run(&mut self) -> RunMetrics {
        let started = Instant::now();
        let evaluated = self.jobs.len();
        let mut launched = 0usize;

        for job in &mut self.jobs {
            match std::panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
                Ok(true) => launched += 1,
                Ok(false) => {}
                Err(_) => {
                    error!(job = %job, "task evaluation panicked");
                }
            }
        }

        self.retire_drained_jobs();

        let metrics = RunMetrics {
            evaluated,
            launched,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if metrics.launched > 0 {
            info!(
                elapsed_ms = metrics.elapsed_ms,
                launched = metrics.launched,
                "task evaluation complete"
            );
        }

        metrics
    }

    fn retire_drained_jobs(&mut self) {
        self.jobs.retain(|job| {
            let keep = job.is_active() || job.is_running();
            if !keep {
                info!(job = %job, "retiring inactive task");
            }
            keep
        });
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}
