//! The keyed option store backing both the global config file and the
//! per-row override configurations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use tracing::{info, warn};

use omicron_core::fs::{file_exists_and_can_read, mtime_millis};
use omicron_core::DEFAULT_TIMESTAMP;

use crate::error::ConfError;
use crate::interval::TimeInterval;
use crate::key::ConfigKey;

/// Immutable snapshot of configuration values.
///
/// Only explicitly-set keys are stored; lookups fall back to the per-key
/// default. Two instances are interchangeable for job identity iff every
/// effective value matches and they were read from the same file revision.
#[derive(Debug, Clone)]
pub struct Configuration {
    values: BTreeMap<ConfigKey, String>,
    file_mtime_millis: i64,
    path: PathBuf,
}

impl Configuration {
    /// Load the config file at `path`.
    ///
    /// A missing or unreadable file is not an error: the supervisor starts
    /// with defaults in that case. Unknown keys and malformed lines are
    /// warned about and dropped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfError> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            info!("no config file specified, using defaults");
            return Ok(Self::defaults());
        }

        if !file_exists_and_can_read(path) {
            info!(path = %path.display(), "config file not found or unreadable, using defaults");
            return Ok(Self {
                values: BTreeMap::new(),
                file_mtime_millis: DEFAULT_TIMESTAMP,
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let mut values = BTreeMap::new();

        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((raw_key, raw_value)) = trimmed.split_once('=') else {
                warn!(line = trimmed, "skipping malformed config line");
                continue;
            };

            let Some(key) = ConfigKey::from_raw(raw_key) else {
                warn!(line = trimmed, "skipping unknown config param");
                continue;
            };

            values.insert(key, raw_value.trim().to_string());
        }

        if values.is_empty() {
            warn!(path = %path.display(), "no config values loaded, using defaults");
        }

        let config = Self {
            values,
            file_mtime_millis: mtime_millis(path),
            path: path.to_path_buf(),
        };

        // Surface a bad downtime spec at load time rather than on first use.
        if let Err(e) = config.downtime() {
            warn!(error = %e, "configured alert downtime is invalid and will be ignored");
        }

        Ok(config)
    }

    /// A configuration holding nothing but defaults, tied to no file.
    pub fn defaults() -> Self {
        Self {
            values: BTreeMap::new(),
            file_mtime_millis: DEFAULT_TIMESTAMP,
            path: PathBuf::new(),
        }
    }

    /// Re-read the backing file, producing a fresh instance.
    pub fn reload(&self) -> Result<Self, ConfError> {
        Self::load(&self.path)
    }

    /// Derive a new instance with some values replaced.
    ///
    /// Keys whose [`ConfigKey::allow_override`] is false are ignored; the
    /// crontab loader warns about them before calling in.
    pub fn with_overrides(&self, overrides: &BTreeMap<ConfigKey, String>) -> Self {
        if overrides.is_empty() {
            return self.clone();
        }

        let mut values = self.values.clone();
        for (key, value) in overrides {
            if key.allow_override() {
                values.insert(*key, value.clone());
            }
        }

        Self {
            values,
            file_mtime_millis: self.file_mtime_millis,
            path: self.path.clone(),
        }
    }

    /// Log every recognised key with its effective value.
    pub fn log_values(&self) {
        for key in ConfigKey::ALL {
            info!("{} = {}", key.raw_name(), self.get(key));
        }
    }

    /// Effective string value of a key, falling back to its default.
    pub fn get(&self, key: ConfigKey) -> &str {
        self.values
            .get(&key)
            .map(String::as_str)
            .unwrap_or_else(|| key.default_value())
    }

    /// Effective value parsed as a decimal integer.
    ///
    /// A value that fails to parse falls back to the key's default (which
    /// always parses) with a warning; a config typo must not take the
    /// supervisor down mid-flight.
    pub fn int(&self, key: ConfigKey) -> i64 {
        let raw = self.get(key);
        match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    key = key.raw_name(),
                    value = raw,
                    "config value is not an integer, using default"
                );
                key.default_value().parse().unwrap_or(0)
            }
        }
    }

    /// Effective value parsed as a case-insensitive boolean.
    pub fn flag(&self, key: ConfigKey) -> bool {
        self.get(key).eq_ignore_ascii_case("true")
    }

    /// The configured IANA time zone, or UTC when unparseable.
    pub fn timezone(&self) -> Tz {
        let raw = self.get(ConfigKey::TimeZone);
        raw.parse().unwrap_or_else(|_| {
            warn!(timezone = raw, "unknown time zone in config, using UTC");
            Tz::UTC
        })
    }

    /// The configured alert downtime window, if any.
    pub fn downtime(&self) -> Result<Option<TimeInterval>, ConfError> {
        let raw = self.get(ConfigKey::AlertDowntime).trim();
        if raw.is_empty() {
            return Ok(None);
        }
        TimeInterval::parse(raw).map(Some)
    }

    /// Mtime of the backing config file at load time.
    pub fn file_mtime_millis(&self) -> i64 {
        self.file_mtime_millis
    }

    /// Path of the backing config file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.file_mtime_millis == other.file_mtime_millis
            && ConfigKey::ALL.into_iter().all(|key| self.get(key) == other.get(key))
    }
}

impl Eq for Configuration {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Configuration::load("/nonexistent/omicron.conf").unwrap();
        assert_eq!(config.get(ConfigKey::CrontabPath), "/etc/crontab");
        assert_eq!(config.int(ConfigKey::TaskMaxInstanceCount), 1);
        assert_eq!(config.file_mtime_millis(), DEFAULT_TIMESTAMP);
    }

    #[test]
    fn file_values_override_defaults() {
        let file = write_config(
            "# omicron config\n\
             timezone=America/Los_Angeles\n\
             task.max.instance.count=3\n\
             alert.email.enabled=TRUE\n",
        );

        let config = Configuration::load(file.path()).unwrap();
        assert_eq!(config.timezone(), chrono_tz::America::Los_Angeles);
        assert_eq!(config.int(ConfigKey::TaskMaxInstanceCount), 3);
        assert!(config.flag(ConfigKey::AlertEmailEnabled));
        // Unset keys still fall back.
        assert_eq!(config.int(ConfigKey::AlertEmailSmtpPort), 25);
    }

    #[test]
    fn unknown_keys_and_garbage_are_dropped() {
        let file = write_config(
            "no.such.key=1\n\
             not a key value line\n\
             task.timeout.minutes=5\n",
        );

        let config = Configuration::load(file.path()).unwrap();
        assert_eq!(config.int(ConfigKey::TaskTimeoutMinutes), 5);
    }

    #[test]
    fn bad_int_falls_back_to_default() {
        let file = write_config("task.max.instance.count=lots\n");
        let config = Configuration::load(file.path()).unwrap();
        assert_eq!(config.int(ConfigKey::TaskMaxInstanceCount), 1);
    }

    #[test]
    fn overrides_respect_allow_override() {
        let config = Configuration::defaults();

        let mut overrides = BTreeMap::new();
        overrides.insert(ConfigKey::TaskMaxInstanceCount, "4".to_string());
        overrides.insert(ConfigKey::CrontabPath, "/tmp/evil".to_string());

        let derived = config.with_overrides(&overrides);
        assert_eq!(derived.int(ConfigKey::TaskMaxInstanceCount), 4);
        // Non-overridable key keeps its default.
        assert_eq!(derived.get(ConfigKey::CrontabPath), "/etc/crontab");
    }

    #[test]
    fn equality_is_value_by_value() {
        let config = Configuration::defaults();
        let same = Configuration::defaults();
        assert_eq!(config, same);

        let mut overrides = BTreeMap::new();
        overrides.insert(ConfigKey::SlaMinutesSinceSuccess, "90".to_string());
        let changed = config.with_overrides(&overrides);
        assert_ne!(config, changed);

        // Overriding with the value already in effect changes nothing.
        let mut noop = BTreeMap::new();
        noop.insert(ConfigKey::SlaMinutesSinceSuccess, "60".to_string());
        assert_eq!(config, config.with_overrides(&noop));
    }

    #[test]
    fn downtime_parses_or_reports() {
        let file = write_config("alert.downtime=01:00+2\n");
        let config = Configuration::load(file.path()).unwrap();
        assert!(config.downtime().unwrap().is_some());

        let empty = Configuration::defaults();
        assert!(empty.downtime().unwrap().is_none());

        let bad = write_config("alert.downtime=whenever\n");
        let config = Configuration::load(bad.path()).unwrap();
        assert!(config.downtime().is_err());
    }

    #[test]
    fn bad_timezone_falls_back_to_utc() {
        let file = write_config("timezone=Mars/Olympus_Mons\n");
        let config = Configuration::load(file.path()).unwrap();
        assert_eq!(config.timezone(), Tz::UTC);
    }
}
