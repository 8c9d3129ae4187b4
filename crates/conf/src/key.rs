//! The closed set of recognised configuration keys.
//!
//! Each key carries its textual name, its default, and whether a crontab
//! row may override it with an `#override:` line.

/// A recognised configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    CrontabPath,
    TimeZone,
    AlertEmailEnabled,
    AlertEmailAddressTo,
    AlertEmailAddressFrom,
    AlertEmailSmtpHost,
    AlertEmailSmtpPort,
    AlertMinutesDelayRepeat,
    AlertDowntime,
    TaskMaxInstanceCount,
    TaskCriticalReturnCode,
    TaskTimeoutMinutes,
    SlaMinutesSinceSuccess,
    SlaCommentedExpressionAlertDelayMinutes,
    SlaMalformedExpressionAlertDelayMinutes,
    CommandPathSu,
    CommandPathKill,
}

impl ConfigKey {
    /// Every recognised key, in config-file display order.
    pub const ALL: [ConfigKey; 17] = [
        ConfigKey::CrontabPath,
        ConfigKey::TimeZone,
        ConfigKey::AlertEmailEnabled,
        ConfigKey::AlertEmailAddressTo,
        ConfigKey::AlertEmailAddressFrom,
        ConfigKey::AlertEmailSmtpHost,
        ConfigKey::AlertEmailSmtpPort,
        ConfigKey::AlertMinutesDelayRepeat,
        ConfigKey::AlertDowntime,
        ConfigKey::TaskMaxInstanceCount,
        ConfigKey::TaskCriticalReturnCode,
        ConfigKey::TaskTimeoutMinutes,
        ConfigKey::SlaMinutesSinceSuccess,
        ConfigKey::SlaCommentedExpressionAlertDelayMinutes,
        ConfigKey::SlaMalformedExpressionAlertDelayMinutes,
        ConfigKey::CommandPathSu,
        ConfigKey::CommandPathKill,
    ];

    /// The key name as it appears in the config file and override lines.
    pub fn raw_name(self) -> &'static str {
        match self {
            ConfigKey::CrontabPath => "crontab.path",
            ConfigKey::TimeZone => "timezone",
            ConfigKey::AlertEmailEnabled => "alert.email.enabled",
            ConfigKey::AlertEmailAddressTo => "alert.email.address.to",
            ConfigKey::AlertEmailAddressFrom => "alert.email.address.from",
            ConfigKey::AlertEmailSmtpHost => "alert.email.smtp.host",
            ConfigKey::AlertEmailSmtpPort => "alert.email.smtp.port",
            ConfigKey::AlertMinutesDelayRepeat => "alert.minutes.delay.repeat",
            ConfigKey::AlertDowntime => "alert.downtime",
            ConfigKey::TaskMaxInstanceCount => "task.max.instance.count",
            ConfigKey::TaskCriticalReturnCode => "task.critical.return.code",
            ConfigKey::TaskTimeoutMinutes => "task.timeout.minutes",
            ConfigKey::SlaMinutesSinceSuccess => "sla.minutes.since.success",
            ConfigKey::SlaCommentedExpressionAlertDelayMinutes => {
                "sla.commented.expression.alert.delay.minutes"
            }
            ConfigKey::SlaMalformedExpressionAlertDelayMinutes => {
                "sla.malformed.expression.alert.delay.minutes"
            }
            ConfigKey::CommandPathSu => "command.path.su",
            ConfigKey::CommandPathKill => "command.path.kill",
        }
    }

    /// Default value used when the key is absent from the config file.
    pub fn default_value(self) -> &'static str {
        match self {
            ConfigKey::CrontabPath => "/etc/crontab",
            ConfigKey::TimeZone => "UTC",
            ConfigKey::AlertEmailEnabled => "false",
            ConfigKey::AlertEmailAddressTo => "someone@example.com",
            ConfigKey::AlertEmailAddressFrom => "someone@example.com",
            ConfigKey::AlertEmailSmtpHost => "localhost",
            ConfigKey::AlertEmailSmtpPort => "25",
            ConfigKey::AlertMinutesDelayRepeat => "20",
            ConfigKey::AlertDowntime => "",
            ConfigKey::TaskMaxInstanceCount => "1",
            // Expected to be between 0 and 255 per the bash man pages.
            ConfigKey::TaskCriticalReturnCode => "100",
            ConfigKey::TaskTimeoutMinutes => "-1",
            ConfigKey::SlaMinutesSinceSuccess => "60",
            ConfigKey::SlaCommentedExpressionAlertDelayMinutes => "-1",
            ConfigKey::SlaMalformedExpressionAlertDelayMinutes => "-1",
            ConfigKey::CommandPathSu => "/usr/bin/su",
            ConfigKey::CommandPathKill => "/usr/bin/kill",
        }
    }

    /// True when a crontab `#override:` line may change this key for one row.
    pub fn allow_override(self) -> bool {
        matches!(
            self,
            ConfigKey::AlertEmailEnabled
                | ConfigKey::AlertMinutesDelayRepeat
                | ConfigKey::AlertDowntime
                | ConfigKey::TaskMaxInstanceCount
                | ConfigKey::TaskCriticalReturnCode
                | ConfigKey::TaskTimeoutMinutes
                | ConfigKey::SlaMinutesSinceSuccess
                | ConfigKey::SlaCommentedExpressionAlertDelayMinutes
                | ConfigKey::SlaMalformedExpressionAlertDelayMinutes
        )
    }

    /// Case-insensitive lookup of a key by its textual name.
    pub fn from_raw(raw: &str) -> Option<ConfigKey> {
        let trimmed = raw.trim();
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.raw_name().eq_ignore_ascii_case(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(ConfigKey::from_raw("TIMEZONE"), Some(ConfigKey::TimeZone));
        assert_eq!(
            ConfigKey::from_raw("  Task.Max.Instance.Count "),
            Some(ConfigKey::TaskMaxInstanceCount)
        );
        assert_eq!(ConfigKey::from_raw("no.such.key"), None);
    }

    #[test]
    fn defaults_parse_as_their_expected_types() {
        assert_eq!(ConfigKey::AlertEmailSmtpPort.default_value().parse::<u16>().unwrap(), 25);
        assert_eq!(ConfigKey::TaskTimeoutMinutes.default_value().parse::<i64>().unwrap(), -1);
        assert_eq!(ConfigKey::AlertEmailEnabled.default_value(), "false");
        assert!(ConfigKey::AlertDowntime.default_value().is_empty());
    }

    #[test]
    fn override_policy_matches_key_classes() {
        assert!(!ConfigKey::CrontabPath.allow_override());
        assert!(!ConfigKey::TimeZone.allow_override());
        assert!(!ConfigKey::AlertEmailAddressTo.allow_override());
        assert!(!ConfigKey::CommandPathSu.allow_override());
        assert!(!ConfigKey::CommandPathKill.allow_override());

        assert!(ConfigKey::AlertEmailEnabled.allow_override());
        assert!(ConfigKey::TaskMaxInstanceCount.allow_override());
        assert!(ConfigKey::TaskTimeoutMinutes.allow_override());
        assert!(ConfigKey::SlaMinutesSinceSuccess.allow_override());
        assert!(ConfigKey::AlertDowntime.allow_override());
    }

    #[test]
    fn all_names_are_distinct() {
        let mut names: Vec<&str> = ConfigKey::ALL.iter().map(|k| k.raw_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ConfigKey::ALL.len());
    }
}
