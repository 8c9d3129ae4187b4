//! Observable task state transitions.

use std::fmt;

/// Status of one task invocation, as recorded in the per-job task log.
///
/// The numeric form exists so a supervised task can publish its status
/// through an atomic while its worker is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Launch preconditions failed or the spawn itself errored.
    FailedStart,
    /// The child process has been launched.
    Started,
    /// The child exited with return code 0.
    Complete,
    /// The child exited with a non-zero return code.
    Error,
    /// The child exceeded its timeout and its process tree was signalled.
    Killed,
    /// A scheduled launch was suppressed (instance cap, inactive, or the
    /// row is not runnable).
    Skipped,
}

impl TaskStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            TaskStatus::FailedStart => 0,
            TaskStatus::Started => 1,
            TaskStatus::Complete => 2,
            TaskStatus::Error => 3,
            TaskStatus::Killed => 4,
            TaskStatus::Skipped => 5,
        }
    }

    pub fn from_u8(value: u8) -> TaskStatus {
        match value {
            1 => TaskStatus::Started,
            2 => TaskStatus::Complete,
            3 => TaskStatus::Error,
            4 => TaskStatus::Killed,
            5 => TaskStatus::Skipped,
            _ => TaskStatus::FailedStart,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::FailedStart => "FailedStart",
            TaskStatus::Started => "Started",
            TaskStatus::Complete => "Complete",
            TaskStatus::Error => "Error",
            TaskStatus::Killed => "Killed",
            TaskStatus::Skipped => "Skipped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_encoding_round_trips() {
        for status in [
            TaskStatus::FailedStart,
            TaskStatus::Started,
            TaskStatus::Complete,
            TaskStatus::Error,
            TaskStatus::Killed,
            TaskStatus::Skipped,
        ] {
            assert_eq!(TaskStatus::from_u8(status.as_u8()), status);
        }
    }

    #[test]
    fn unknown_encodings_collapse_to_failed_start() {
        assert_eq!(TaskStatus::from_u8(250), TaskStatus::FailedStart);
    }
}
