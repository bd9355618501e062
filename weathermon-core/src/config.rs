use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const SMTP_PASSWORD_ENV: &str = "WEATHERMON_SMTP_PASSWORD";

const SUMMARY_TIME_FORMAT: &str = "%H:%M";

/// Mail submission settings for alert emails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    /// May be supplied through `WEATHERMON_SMTP_PASSWORD` instead.
    #[serde(default)]
    pub password: Option<String>,
    pub sender: String,
    pub recipient: String,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// cities = ["Delhi", "Mumbai"]
/// poll_interval_secs = 300
/// alert_threshold_c = 35.0
/// summary_time = "23:59"
///
/// [smtp]
/// host = "smtp.example.com"
/// username = "alerts@example.com"
/// sender = "alerts@example.com"
/// recipient = "me@example.com"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    /// Polling and reporting order.
    pub cities: Vec<String>,
    pub poll_interval_secs: u64,
    pub alert_threshold_c: f64,
    /// Defaults to `weather_data.db` in the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Local time of day (`HH:MM`) after which the daily summary is printed.
    pub summary_time: String,
    pub request_timeout_secs: u64,
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            cities: ["Delhi", "Mumbai", "Chennai", "Bangalore", "Kolkata", "Hyderabad"]
                .into_iter()
                .map(String::from)
                .collect(),
            poll_interval_secs: 300,
            alert_threshold_c: 35.0,
            database_path: None,
            summary_time: "23:59".to_string(),
            request_timeout_secs: 30,
            smtp: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

impl Config {
    /// Load config from `path` (or the platform default), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::load_file(path)?;
        cfg.apply_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Load only what is on disk, or defaults when the file doesn't exist yet.
    pub fn load_file(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        let cfg: Self = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        Ok(cfg)
    }

    /// Save config to `path` (or the platform default), creating parent directories as needed.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Override secrets from the environment. `lookup` is `std::env::var` in production.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }

        if let Some(password) = lookup(SMTP_PASSWORD_ENV) {
            if let Some(smtp) = self.smtp.as_mut() {
                smtp.password = Some(password);
            }
        }
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `weathermon configure` or set {API_KEY_ENV}."
            )
        })
    }

    pub fn summary_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.summary_time.trim(), SUMMARY_TIME_FORMAT).with_context(
            || format!("Invalid summary_time '{}', expected HH:MM", self.summary_time),
        )
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(p) => Ok(p.clone()),
            None => Ok(project_dirs()?.data_dir().join("weather_data.db")),
        }
    }

    /// Reject settings the monitor can't run with.
    pub fn validate(&self) -> Result<()> {
        if self.cities.is_empty() {
            bail!("No cities configured");
        }

        let mut seen = HashSet::new();
        for city in &self.cities {
            if city.trim().is_empty() {
                bail!("City names must not be blank");
            }
            if !seen.insert(city.to_lowercase()) {
                bail!("City '{city}' is listed more than once");
            }
        }

        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }

        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }

        if !self.alert_threshold_c.is_finite() {
            bail!("alert_threshold_c must be a finite number");
        }

        self.summary_time()?;
        Ok(())
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weathermon", "weathermon")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
