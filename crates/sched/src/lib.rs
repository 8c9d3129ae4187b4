//! Job lifecycle management: one [`Job`] per retained crontab row, a
//! [`JobManager`] that reconciles the job set against crontab reloads and
//! drives every job once per calendar minute.

pub mod job;
pub mod manager;

pub use job::Job;
pub use manager::{JobManager, RunMetrics};
