mod daemon;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use omicron_conf::Configuration;
use omicron_core::SystemClock;
use omicron_crontab::Crontab;
use omicron_exec::ProcFs;
use omicron_notify::AlertManager;
use omicron_sched::JobManager;

const DEFAULT_CONFIG_PATH: &str = "/etc/omicron/omicron.conf";

/// A drop-in replacement for vanilla cron with first-class monitoring.
#[derive(Parser, Debug)]
#[command(name = "omicron", version, about)]
struct Cli {
    /// Path to the omicron config file.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // A lone '?' anywhere in the first argument means "show me the usage".
    if std::env::args().nth(1).is_some_and(|arg| arg.contains('?')) {
        print_help();
        return Ok(());
    }

    let cli = Cli::parse();

    let clock = Arc::new(SystemClock);
    let hierarchy = Arc::new(ProcFs);

    let configuration = Configuration::load(cli.config_path.trim())
        .context("failed to load configuration")?;
    configuration.log_values();

    let crontab =
        Crontab::load(&configuration, clock.as_ref()).context("failed to read crontab")?;

    let mut manager = JobManager::new(
        &configuration,
        &crontab,
        hierarchy,
        Arc::clone(&clock) as _,
    );

    let mut alerts = AlertManager::new(&configuration, Arc::clone(&clock) as _)
        .context("failed to initialise alerting")?;

    info!(
        rows = crontab.rows().len(),
        bad_rows = crontab.bad_row_count(),
        "omicron started"
    );

    // Runs until the process is killed; any error out of the loop is fatal.
    daemon::run(configuration, crontab, &mut manager, &mut alerts, clock).await
}

fn print_help() {
    println!("OMICRON - A drop-in replacement for vanilla cron on most unix systems");
    println!("usage: omicron <config path: defaults to {DEFAULT_CONFIG_PATH}>");
    println!("Passing '?' as a parameter prints this message");
}
