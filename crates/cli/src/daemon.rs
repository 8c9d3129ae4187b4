//! The calendar-minute scheduler loop.
//!
//! Ticks once per calendar minute, as close to second zero as drift and
//! load allow. Between ticks it watches the config and crontab files for
//! changes and reloads both when either moves; a reload never interrupts an
//! in-flight evaluation because both happen on this single loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use omicron_conf::{ConfigKey, Configuration};
use omicron_core::clock::minute_floor;
use omicron_core::fs::mtime_millis;
use omicron_core::Clock;
use omicron_crontab::Crontab;
use omicron_notify::AlertManager;
use omicron_sched::JobManager;

/// Drive the supervisor forever.
///
/// A skipped minute (sleep, clock jumps, very long reload) is warned about
/// and forgotten; catch-up runs would double-fire jobs that watch the same
/// minute from their own schedules.
pub async fn run(
    mut configuration: Configuration,
    mut crontab: Crontab,
    manager: &mut JobManager,
    alerts: &mut AlertManager,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    let mut target_minute = minute_floor(clock.now_millis(), 1);

    loop {
        let mut current_minute = minute_floor(clock.now_millis(), 0);

        // Watch for file changes until the target minute comes up or has
        // passed; `<` rather than equality, so a late wake still fires the
        // tick.
        while current_minute < target_minute {
            if reload_due(&configuration, &crontab) {
                info!("configuration or crontab updated, reloading");

                // A crontab that was readable at startup but vanished on
                // reload is fatal, matching startup behaviour.
                configuration = configuration.reload().context("failed to reload configuration")?;
                crontab = Crontab::load(&configuration, clock.as_ref())
                    .context("failed to reload crontab")?;

                manager.update_configuration(&configuration, &crontab);
                if let Err(e) = alerts.update_configuration(&configuration) {
                    warn!(error = %e, "alert delivery not reconfigured, keeping previous settings");
                }
            }

            tokio::time::sleep(Duration::from_secs(1)).await;
            current_minute = minute_floor(clock.now_millis(), 0);
        }

        if current_minute != target_minute {
            warn!(
                missed_target = target_minute,
                "scheduled tasks may have been missed due to a skipped minute"
            );
        }

        // Aim for the minute after the one we are about to evaluate.
        target_minute = minute_floor(clock.now_millis(), 1);

        let metrics = manager.run();
        alerts.send_alerts(manager.jobs());

        debug!(metrics = %serde_json::to_string(&metrics).unwrap_or_default(), "tick complete");
    }
}

/// True when either watched file is newer than the loaded snapshot.
fn reload_due(configuration: &Configuration, crontab: &Crontab) -> bool {
    let config_moved = mtime_millis(configuration.path()) > configuration.file_mtime_millis();

    let crontab_moved =
        mtime_millis(configuration.get(ConfigKey::CrontabPath)) > crontab.file_mtime_millis();

    config_moved || crontab_moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use omicron_core::ManualClock;
    use std::io::Write;

    #[test]
    fn minute_targets_are_whole_minutes_apart() {
        let clock = ManualClock::new(90_500);
        let current = minute_floor(clock.now_millis(), 0);
        let target = minute_floor(clock.now_millis(), 1);

        assert_eq!(current, 60_000);
        assert_eq!(target, 120_000);
        assert_eq!(target - current, 60_000);
    }

    #[tokio::test]
    async fn reload_due_notices_crontab_changes() {
        let mut crontab_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(crontab_file, "* * * * * root echo hi").unwrap();
        crontab_file.flush().unwrap();

        let mut config_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(config_file, "crontab.path={}", crontab_file.path().display()).unwrap();
        config_file.flush().unwrap();

        let clock = ManualClock::new(0);
        let configuration = Configuration::load(config_file.path()).unwrap();
        let crontab = Crontab::load(&configuration, &clock).unwrap();

        assert!(!reload_due(&configuration, &crontab));

        // Touch the crontab with a strictly newer mtime.
        std::thread::sleep(Duration::from_millis(1_100));
        writeln!(crontab_file, "# touched").unwrap();
        crontab_file.flush().unwrap();

        assert!(reload_due(&configuration, &crontab));
    }
}
