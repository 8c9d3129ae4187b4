//! A single supervised invocation of a job's command.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::{error, info, warn};

use omicron_core::fs::file_exists_and_can_read;
use omicron_core::host::is_running_as_root;
use omicron_core::Clock;

use crate::proctree::{collect_tree, ProcessHierarchy};
use crate::status::TaskStatus;

const UNKNOWN_PID: i64 = -1;
const UNKNOWN_END_TIME: i64 = -1;
const DEFAULT_RETURN_CODE: i32 = 255;

/// One child process launched as the row's executing user via `su`.
///
/// The worker that supervises the child writes only to the atomic fields
/// below; the owning job polls them and never blocks on the child. The task
/// counts as done once an end time has been published, including when the
/// launch preconditions failed.
pub struct RunningTask {
    task_id: u64,
    command_line: String,
    executing_user: String,
    launch_time_millis: i64,
    timeout_minutes: i64,
    su_command: String,
    kill_command: String,

    pid: AtomicI64,
    end_time_millis: AtomicI64,
    return_code: AtomicI32,
    status: AtomicU8,

    hierarchy: Arc<dyn ProcessHierarchy>,
    clock: Arc<dyn Clock>,
}

impl RunningTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task_id: u64,
        command_line: impl Into<String>,
        executing_user: impl Into<String>,
        timeout_minutes: i64,
        su_command: impl Into<String>,
        kill_command: impl Into<String>,
        hierarchy: Arc<dyn ProcessHierarchy>,
        clock: Arc<dyn Clock>,
    ) -> RunningTask {
        let launch_time_millis = clock.now_millis();
        RunningTask {
            task_id,
            command_line: command_line.into(),
            executing_user: executing_user.into(),
            launch_time_millis,
            timeout_minutes,
            su_command: su_command.into(),
            kill_command: kill_command.into(),
            pid: AtomicI64::new(UNKNOWN_PID),
            end_time_millis: AtomicI64::new(UNKNOWN_END_TIME),
            return_code: AtomicI32::new(DEFAULT_RETURN_CODE),
            status: AtomicU8::new(TaskStatus::FailedStart.as_u8()),
            hierarchy,
            clock,
        }
    }

    /// Launch the supervision worker on the runtime.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.supervise().await })
    }

    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn launch_time_millis(&self) -> i64 {
        self.launch_time_millis
    }

    pub fn pid(&self) -> i64 {
        self.pid.load(Ordering::SeqCst)
    }

    pub fn end_time_millis(&self) -> i64 {
        self.end_time_millis.load(Ordering::SeqCst)
    }

    pub fn return_code(&self) -> i32 {
        self.return_code.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// True once the worker has published an end time.
    pub fn is_done(&self) -> bool {
        self.end_time_millis() > UNKNOWN_END_TIME
    }

    async fn supervise(&self) {
        if !self.check_preconditions() {
            self.finish_now();
            return;
        }

        let mut child = match Command::new(&self.su_command)
            .arg("-")
            .arg(&self.executing_user)
            .arg("-c")
            .arg(&self.command_line)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!(command = self.command_line, error = %e, "command failed to start");
                self.finish_now();
                return;
            }
        };

        if let Some(pid) = child.id() {
            self.pid.store(pid as i64, Ordering::SeqCst);
        }
        self.set_status(TaskStatus::Started);

        info!(pid = self.pid(), command = self.command_line, "task started");

        if self.timeout_minutes > 0 {
            self.wait_with_timeout(&mut child).await;
        } else {
            match child.wait().await {
                Ok(exit) => self.record_exit(&exit),
                Err(e) => error!(command = self.command_line, error = %e, "wait for child failed"),
            }
        }

        // A kill keeps its Killed status; everything else resolves on the
        // recorded return code.
        if self.status() != TaskStatus::Killed {
            let final_status = if self.return_code() == 0 {
                TaskStatus::Complete
            } else {
                TaskStatus::Error
            };
            self.set_status(final_status);
        }

        self.finish_now();

        info!(
            pid = self.pid(),
            command = self.command_line,
            status = %self.status(),
            duration_minutes = (self.end_time_millis() - self.launch_time_millis) / 60_000,
            "task terminated"
        );
    }

    /// Bounded wait: on each timeout the whole process tree is signalled and
    /// the wait restarts, since an unkillable child must not leak workers.
    async fn wait_with_timeout(&self, child: &mut tokio::process::Child) {
        let limit = Duration::from_secs(self.timeout_minutes as u64 * 60);
        let mut kill_count = 0u32;

        loop {
            match tokio::time::timeout(limit, child.wait()).await {
                Ok(Ok(exit)) => {
                    self.record_exit(&exit);
                    break;
                }
                Ok(Err(e)) => {
                    error!(command = self.command_line, error = %e, "wait for child failed");
                    break;
                }
                Err(_) => {
                    self.set_status(TaskStatus::Killed);
                    self.kill_tree().await;
                    kill_count += 1;

                    if kill_count > 1 {
                        error!(
                            attempts = kill_count,
                            command = self.command_line,
                            "repeated kill attempts after timeout have not stopped the task"
                        );
                    }
                }
            }
        }
    }

    /// SIGKILL every PID in the tree rooted at the captured child PID.
    async fn kill_tree(&self) {
        let root = self.pid();

        if root <= UNKNOWN_PID {
            warn!(command = self.command_line, "cannot kill task, pid was never captured");
            return;
        }

        let pids = collect_tree(self.hierarchy.as_ref(), root);
        let pid_list = pids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");

        warn!(
            timeout_minutes = self.timeout_minutes,
            pids = %pid_list,
            command = self.command_line,
            "task timeout, killing pid tree"
        );

        // A PID can in principle be recycled between enumeration and kill;
        // hosts avoid quick recycling, so the window is accepted.
        for pid in pids {
            let result = Command::new(&self.kill_command)
                .arg("-9")
                .arg(pid.to_string())
                .status()
                .await;

            if let Err(e) = result {
                warn!(pid, error = %e, "kill command failed to run");
            }
        }
    }

    fn check_preconditions(&self) -> bool {
        if !is_running_as_root() {
            warn!(command = self.command_line, "not running as root, cannot execute");
            return false;
        }

        if !file_exists_and_can_read(&self.su_command) {
            warn!(path = self.su_command, "su command does not exist at the configured location");
            return false;
        }

        if !file_exists_and_can_read(&self.kill_command) {
            warn!(path = self.kill_command, "kill command does not exist at the configured location");
            return false;
        }

        true
    }

    fn record_exit(&self, exit: &ExitStatus) {
        self.return_code.store(exit_code(exit).abs(), Ordering::SeqCst);
    }

    fn set_status(&self, status: TaskStatus) {
        self.status.store(status.as_u8(), Ordering::SeqCst);
    }

    fn finish_now(&self) {
        self.end_time_millis.store(self.clock.now_millis(), Ordering::SeqCst);
    }
}

/// Numeric exit code of a child, mapping signal deaths to the conventional
/// `128 + signal` shell encoding.
#[cfg(unix)]
fn exit_code(exit: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    exit.code()
        .or_else(|| exit.signal().map(|signal| 128 + signal))
        .unwrap_or(DEFAULT_RETURN_CODE)
}

#[cfg(not(unix))]
fn exit_code(exit: &ExitStatus) -> i32 {
    exit.code().unwrap_or(DEFAULT_RETURN_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use omicron_core::ManualClock;
    use std::collections::HashMap;

    struct Scripted(HashMap<i64, Vec<i64>>);

    impl ProcessHierarchy for Scripted {
        fn children(&self, pid: i64) -> Vec<i64> {
            self.0.get(&pid).cloned().unwrap_or_default()
        }
    }

    fn task_with(su: &str, kill: &str, timeout_minutes: i64) -> Arc<RunningTask> {
        Arc::new(RunningTask::new(
            1,
            "echo hello",
            "root",
            timeout_minutes,
            su,
            kill,
            Arc::new(Scripted(HashMap::new())),
            Arc::new(ManualClock::new(120_000)),
        ))
    }

    #[tokio::test]
    async fn missing_su_fails_start_immediately() {
        let task = task_with("/nonexistent/su", "/bin/true", -1);
        task.supervise().await;

        assert!(task.is_done());
        assert_eq!(task.status(), TaskStatus::FailedStart);
        assert_eq!(task.return_code(), 255);
        assert_eq!(task.pid(), -1);
        assert_eq!(task.end_time_millis(), 120_000);
    }

    #[tokio::test]
    async fn missing_kill_fails_start_immediately() {
        let task = task_with("/bin/true", "/nonexistent/kill", -1);
        task.supervise().await;

        assert!(task.is_done());
        assert_eq!(task.status(), TaskStatus::FailedStart);
    }

    #[tokio::test]
    async fn successful_child_completes_with_zero() {
        // Launch requires root; when the test host is unprivileged the
        // precondition path is already covered above.
        if !is_running_as_root() {
            return;
        }

        // /bin/echo swallows the su-style arguments and exits 0.
        let task = task_with("/bin/echo", "/bin/true", -1);
        task.supervise().await;

        assert!(task.is_done());
        assert_eq!(task.status(), TaskStatus::Complete);
        assert_eq!(task.return_code(), 0);
        assert!(task.pid() > 0);
    }

    #[tokio::test]
    async fn failing_child_records_error_status() {
        if !is_running_as_root() {
            return;
        }

        // `false` exits 1 regardless of arguments.
        let task = task_with("/bin/false", "/bin/true", -1);
        task.supervise().await;

        assert!(task.is_done());
        assert_eq!(task.status(), TaskStatus::Error);
        assert_ne!(task.return_code(), 0);
    }

    #[test]
    fn fresh_task_is_not_done() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let task = RunningTask::new(
            7,
            "sleep 1",
            "root",
            -1,
            "/usr/bin/su",
            "/usr/bin/kill",
            Arc::new(Scripted(HashMap::new())),
            clock,
        );

        assert!(!task.is_done());
        assert_eq!(task.status(), TaskStatus::FailedStart);
        assert_eq!(task.task_id(), 7);
        assert_eq!(task.return_code(), 255);
    }
}
