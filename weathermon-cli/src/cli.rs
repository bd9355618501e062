use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

use weathermon_core::{
    Config, Monitor, MonitorConfig, ReadingStore, SqliteStore, SystemClock, ThresholdAlerter,
    notify::notifier_from_config, provider::provider_from_config, summary::daily_report,
    visualize::render_chart,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weathermon", version, about = "Poll, store and report city weather")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll every configured city on the interval until interrupted.
    Run,

    /// Run a single poll cycle and exit.
    Poll,

    /// Print the daily summary for each configured city.
    Summary {
        /// Date as YYYY-MM-DD; defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Render daily temperature and humidity averages to an image.
    Plot {
        /// Output file; `.svg` writes SVG, anything else PNG.
        #[arg(long, short, default_value = "weather_summary.png")]
        output: PathBuf,

        /// Plot every city in the database rather than the configured list.
        #[arg(long)]
        all_stored: bool,
    },

    /// Interactively edit the configuration file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = self.config.as_deref();
        let config = Config::load(config_path)?;

        match self.command {
            Command::Run => {
                let mut monitor = build_monitor(&config)?;
                monitor.run(|report| print!("{report}")).await?;
            }
            Command::Poll => {
                let monitor = build_monitor(&config)?;
                let report = monitor.poll_cycle().await;
                println!(
                    "Stored {} reading(s), {} failed, {} alert(s).",
                    report.stored, report.failed, report.alerts
                );
            }
            Command::Summary { date } => {
                let store = open_store(&config)?;
                let date = date.unwrap_or_else(|| Local::now().date_naive());
                let report = daily_report(&store, &config.cities, date)?;
                print!("{report}");
            }
            Command::Plot { output, all_stored } => {
                let store = open_store(&config)?;
                let cities = if all_stored { store.cities()? } else { config.cities.clone() };
                render_chart(&store, &cities, &output)?;
                println!("Chart written to {}", output.display());
            }
            Command::Configure => {
                // Start from the file alone so env-provided secrets aren't written back.
                let on_disk = Config::load_file(config_path)?;
                let path = crate::configure::interactive(on_disk, config_path)?;
                println!("Configuration saved to {}", path.display());
            }
        }

        Ok(())
    }
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    let path = config.database_path()?;
    SqliteStore::open(&path)
        .with_context(|| format!("Failed to open weather database at {}", path.display()))
}

fn build_monitor(config: &Config) -> Result<Monitor> {
    let monitor_config = MonitorConfig::from_config(config)?;
    let provider = provider_from_config(config)?;
    let store: Arc<dyn ReadingStore> = Arc::new(open_store(config)?);
    let notifier = notifier_from_config(config.smtp.as_ref())?;
    let alerter = ThresholdAlerter::new(config.alert_threshold_c, notifier);

    Ok(Monitor::new(monitor_config, provider, store, alerter, Box::new(SystemClock)))
}
