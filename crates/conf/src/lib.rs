//! Configuration layer for the omicron task supervisor.
//!
//! The config file is plain `key=value` text against a closed set of
//! recognised keys. Individual crontab rows may override a subset of the
//! global values via `#override:` lines; whether a key honours such an
//! override is a property of the key itself.

pub mod config;
pub mod error;
pub mod interval;
pub mod key;

pub use config::Configuration;
pub use error::ConfError;
pub use interval::TimeInterval;
pub use key::ConfigKey;
