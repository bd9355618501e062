//! Core library for the `weathermon` monitor.
//!
//! This crate defines:
//! - Configuration loading and validation
//! - The OpenWeather provider adapter and normalized readings
//! - SQLite persistence and daily aggregation
//! - Threshold alerting with email notification
//! - The polling scheduler and the chart renderer
//!
//! It is used by `weathermon-cli`, but every collaborator sits behind a trait
//! so the loop can be driven with fakes.

pub mod alert;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod summary;
pub mod visualize;

pub use alert::ThresholdAlerter;
pub use config::{Config, SmtpConfig};
pub use error::FetchError;
pub use model::{DailySummary, Reading, SeriesPoint};
pub use notify::{AlertMessage, EmailNotifier, LogNotifier, Notifier};
pub use provider::WeatherProvider;
pub use scheduler::{Clock, CycleReport, Monitor, MonitorConfig, SystemClock};
pub use store::{ReadingStore, SqliteStore};
pub use summary::{CitySummary, DailyReport};
