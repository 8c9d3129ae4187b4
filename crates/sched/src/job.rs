//! One scheduled job: a crontab row bound to its effective configuration.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use omicron_conf::{ConfigKey, Configuration};
use omicron_core::clock::zoned;
use omicron_core::{Clock, DEFAULT_TIMESTAMP};
use omicron_crontab::{CrontabRow, Schedule};
use omicron_exec::{EvictingLog, ProcessHierarchy, RunningTask, TaskLogEntry, TaskStatus};

static JOB_IDS: AtomicU64 = AtomicU64::new(0);

/// Per-schedule coordinator: owns the row's running children and its
/// bounded task log.
///
/// Identity for crontab reconciliation is the pair (row, configuration);
/// a reload that changes a row's override yields a brand-new job while an
/// untouched row carries its instance (and therefore its log and counters)
/// across the reload.
pub struct Job {
    job_id: u64,
    row: CrontabRow,
    schedule: Option<Schedule>,
    command_line: String,
    executing_user: String,
    configuration: Configuration,
    /// Newest first, so iterating from the back sweeps in launch order.
    running_tasks: VecDeque<Arc<RunningTask>>,
    task_log: Mutex<EvictingLog>,
    active: bool,
    scheduled_run_count: u64,
    next_execution_millis: i64,
    hierarchy: Arc<dyn ProcessHierarchy>,
    clock: Arc<dyn Clock>,
}

impl Job {
    pub fn new(
        row: CrontabRow,
        command_line: impl Into<String>,
        configuration: Configuration,
        hierarchy: Arc<dyn ProcessHierarchy>,
        clock: Arc<dyn Clock>,
    ) -> Job {
        let schedule = row.schedule().cloned();
        let executing_user = row.executing_user().to_string();

        Job {
            job_id: JOB_IDS.fetch_add(1, Ordering::Relaxed) + 1,
            row,
            schedule,
            command_line: command_line.into(),
            executing_user,
            configuration,
            running_tasks: VecDeque::new(),
            task_log: Mutex::new(EvictingLog::new()),
            active: true,
            scheduled_run_count: 0,
            next_execution_millis: DEFAULT_TIMESTAMP,
            hierarchy,
            clock,
        }
    }

    /// The per-minute work routine.
    ///
    /// Sweeps finished children into the task log, evaluates the schedule
    /// against the current calendar minute in the configured time zone, and
    /// either launches a task or records why it did not. Returns true when
    /// a task was launched.
    pub fn run(&mut self) -> bool {
        self.sweep_running_tasks();

        // Malformed rows have no schedule to evaluate; they are retained
        // purely for SLA reporting.
        let Some(schedule) = self.schedule.clone() else {
            return false;
        };

        let now_local = zoned(self.clock.now_millis(), self.configuration.timezone());

        if !schedule.matches(&now_local) {
            return false;
        }

        self.scheduled_run_count += 1;

        if !self.should_run_now() {
            self.write_log_entry(TaskLogEntry::new(
                self.scheduled_run_count,
                TaskStatus::Skipped,
                now_local.timestamp_millis(),
            ));
            return false;
        }

        let task = Arc::new(RunningTask::new(
            self.scheduled_run_count,
            self.command_line.clone(),
            self.executing_user.clone(),
            self.configuration.int(ConfigKey::TaskTimeoutMinutes),
            self.configuration.get(ConfigKey::CommandPathSu).to_string(),
            self.configuration.get(ConfigKey::CommandPathKill).to_string(),
            Arc::clone(&self.hierarchy),
            Arc::clone(&self.clock),
        ));

        let task_id = task.task_id();
        let launch_time = task.launch_time_millis();

        // Most recent run goes to the front so sweeping can walk from the
        // back in chronological order.
        self.running_tasks.push_front(Arc::clone(&task));
        task.spawn();

        self.write_log_entry(TaskLogEntry::new(task_id, TaskStatus::Started, launch_time));

        self.next_execution_millis = schedule
            .next_run_after(&now_local)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(DEFAULT_TIMESTAMP);

        info!(
            scheduled = %now_local.format("%Y%m%d %H:%M %Z"),
            line = self.row.line_number(),
            "executing job"
        );

        true
    }

    fn should_run_now(&self) -> bool {
        if !self.is_runnable() {
            return false;
        }

        if !self.active {
            info!(command = self.command_line, "job skipped execution because it is inactive");
            return false;
        }

        let max_instances = self.configuration.int(ConfigKey::TaskMaxInstanceCount).max(0) as usize;
        if self.running_tasks.len() >= max_instances {
            warn!(
                command = self.command_line,
                running = self.running_tasks.len(),
                "job skipped execution, instance cap reached"
            );
            return false;
        }

        true
    }

    /// Move finished children out of the running list and into the log.
    fn sweep_running_tasks(&mut self) {
        for index in (0..self.running_tasks.len()).rev() {
            let task = &self.running_tasks[index];

            if task.is_done() {
                let entry =
                    TaskLogEntry::new(task.task_id(), task.status(), task.end_time_millis());
                self.running_tasks.remove(index);
                self.write_log_entry(entry);
            }
        }
    }

    fn write_log_entry(&self, entry: TaskLogEntry) {
        let mut log = match self.task_log.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.push(entry);
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn row(&self) -> &CrontabRow {
        &self.row
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn is_runnable(&self) -> bool {
        self.row.is_runnable()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_running(&self) -> bool {
        !self.running_tasks.is_empty()
    }

    pub fn running_task_count(&self) -> usize {
        self.running_tasks.len()
    }

    pub fn scheduled_run_count(&self) -> u64 {
        self.scheduled_run_count
    }

    /// Epoch millis of the next whitelisted minute computed at launch time.
    pub fn next_execution_millis(&self) -> i64 {
        self.next_execution_millis
    }

    /// Chronological snapshot of log entries matching the given statuses.
    pub fn filtered_log(&self, statuses: &[TaskStatus]) -> Vec<TaskLogEntry> {
        let log = match self.task_log.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.filtered(statuses)
    }

    pub fn has_log_entries(&self) -> bool {
        let log = match self.task_log.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        !log.is_empty()
    }

    /// Reconciliation identity: same row text (case-insensitive, same
    /// commented flag) under an equal effective configuration.
    pub fn same_identity(&self, row: &CrontabRow, configuration: &Configuration) -> bool {
        self.row == *row && self.configuration == *configuration
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.row)
    }
}
