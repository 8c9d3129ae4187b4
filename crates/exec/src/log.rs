//! The bounded per-job task log.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::status::TaskStatus;

/// Maximum number of retained entries per job; the oldest are evicted first.
pub const TASK_LOG_CAPACITY: usize = 500;

static ENTRY_IDS: AtomicU64 = AtomicU64::new(0);

/// One observed status transition of a task.
///
/// Entries order by `(timestamp, entry_id)` so same-millisecond transitions
/// keep their observation order, and compare equal only by entry id.
#[derive(Debug, Clone)]
pub struct TaskLogEntry {
    entry_id: u64,
    timestamp_millis: i64,
    task_id: u64,
    status: TaskStatus,
}

impl TaskLogEntry {
    pub fn new(task_id: u64, status: TaskStatus, timestamp_millis: i64) -> TaskLogEntry {
        TaskLogEntry {
            entry_id: ENTRY_IDS.fetch_add(1, Ordering::Relaxed),
            timestamp_millis,
            task_id,
            status,
        }
    }

    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }
}

impl PartialEq for TaskLogEntry {
    fn eq(&self, other: &Self) -> bool {
        self.entry_id == other.entry_id
    }
}

impl Eq for TaskLogEntry {}

impl PartialOrd for TaskLogEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskLogEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp_millis
            .cmp(&other.timestamp_millis)
            .then(self.entry_id.cmp(&other.entry_id))
    }
}

/// Ordered set of log entries that drops its oldest members past capacity.
#[derive(Debug)]
pub struct EvictingLog {
    entries: BTreeSet<TaskLogEntry>,
    capacity: usize,
}

impl Default for EvictingLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictingLog {
    pub fn new() -> EvictingLog {
        Self::with_capacity(TASK_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> EvictingLog {
        EvictingLog {
            entries: BTreeSet::new(),
            capacity,
        }
    }

    pub fn push(&mut self, entry: TaskLogEntry) {
        self.entries.insert(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_first();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Chronologically ordered snapshot of entries matching the filter.
    pub fn filtered(&self, statuses: &[TaskStatus]) -> Vec<TaskLogEntry> {
        self.entries
            .iter()
            .filter(|entry| statuses.contains(&entry.status()))
            .cloned()
            .collect()
    }
}
