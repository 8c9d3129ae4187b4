//! Crontab parsing and schedule evaluation.
//!
//! A crontab row is the classic five-field schedule plus an executing user
//! and a command. Rows that are commented-but-parseable or uncommented-but-
//! malformed are retained so the SLA policies can alert on them; only
//! general comments are discarded.

pub mod crontab;
pub mod error;
pub mod row;
pub mod schedule;
pub mod variable;

pub use crontab::Crontab;
pub use error::CrontabError;
pub use row::CrontabRow;
pub use schedule::Schedule;
pub use variable::{substitute, CronVariable};
