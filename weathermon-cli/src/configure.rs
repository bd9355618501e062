use anyhow::{Context, Result};
use inquire::{Confirm, CustomType, Password, Text};
use std::path::{Path, PathBuf};

use weathermon_core::{Config, SmtpConfig};

/// Walk through every setting, pre-filled with the current values, then save.
pub fn interactive(mut config: Config, path: Option<&Path>) -> Result<PathBuf> {
    let api_key = Password::new("OpenWeather API key (leave empty to keep current):")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.api_key = Some(api_key.trim().to_string());
    }

    let cities = Text::new("Cities (comma separated):")
        .with_default(&config.cities.join(", "))
        .prompt()
        .context("Failed to read cities")?;
    config.cities = cities
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();

    config.poll_interval_secs = CustomType::<u64>::new("Poll interval (seconds):")
        .with_default(config.poll_interval_secs)
        .prompt()
        .context("Failed to read poll interval")?;

    config.alert_threshold_c = CustomType::<f64>::new("Alert threshold (°C):")
        .with_default(config.alert_threshold_c)
        .prompt()
        .context("Failed to read alert threshold")?;

    config.summary_time = Text::new("Daily summary time (HH:MM):")
        .with_default(&config.summary_time)
        .prompt()
        .context("Failed to read summary time")?;

    let db_default = config.database_path()?.display().to_string();
    let db = Text::new("Database file:")
        .with_default(&db_default)
        .prompt()
        .context("Failed to read database path")?;
    config.database_path = Some(PathBuf::from(db));

    let wants_email = Confirm::new("Send alert emails over SMTP?")
        .with_default(config.smtp.is_some())
        .prompt()
        .context("Failed to read SMTP choice")?;

    config.smtp = if wants_email { Some(prompt_smtp(config.smtp.take())?) } else { None };

    config.validate()?;
    config.save(path)
}

fn prompt_smtp(current: Option<SmtpConfig>) -> Result<SmtpConfig> {
    let host_default = current.as_ref().map(|s| s.host.clone()).unwrap_or_default();
    let host = Text::new("SMTP host:").with_default(&host_default).prompt()?;

    let port = CustomType::<u16>::new("SMTP port:")
        .with_default(current.as_ref().map_or(587, |s| s.port))
        .prompt()?;

    let username_default = current.as_ref().map(|s| s.username.clone()).unwrap_or_default();
    let username = Text::new("SMTP username:").with_default(&username_default).prompt()?;

    let password = Password::new("SMTP password (leave empty to use WEATHERMON_SMTP_PASSWORD):")
        .without_confirmation()
        .prompt()?;
    let password = if password.is_empty() {
        current.as_ref().and_then(|s| s.password.clone())
    } else {
        Some(password)
    };

    let sender_default = current.as_ref().map(|s| s.sender.clone()).unwrap_or(username.clone());
    let sender = Text::new("Sender address:").with_default(&sender_default).prompt()?;

    let recipient_default = current.as_ref().map(|s| s.recipient.clone()).unwrap_or_default();
    let recipient = Text::new("Alert recipient address:")
        .with_default(&recipient_default)
        .prompt()?;

    Ok(SmtpConfig { host, port, username, password, sender, recipient })
}
