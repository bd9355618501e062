use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Offset between the Kelvin and Celsius scales.
pub const KELVIN_OFFSET: f64 = 273.15;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// One normalized observation for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub city: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub condition: String,
    /// Provider epoch seconds.
    pub observed_at: i64,
    /// Local calendar date of `observed_at`.
    pub observed_date: NaiveDate,
}

impl Reading {
    /// Build a reading, deriving `observed_date` from `observed_at` in local time.
    ///
    /// Returns `None` when the timestamp is outside the representable range.
    pub fn new(
        city: impl Into<String>,
        temperature_c: f64,
        feels_like_c: f64,
        humidity_pct: u8,
        condition: impl Into<String>,
        observed_at: i64,
    ) -> Option<Self> {
        let observed_date = local_date(observed_at)?;

        Some(Self {
            city: city.into(),
            temperature_c,
            feels_like_c,
            humidity_pct,
            condition: condition.into(),
            observed_at,
            observed_date,
        })
    }
}

pub fn local_date(epoch: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(epoch, 0).map(|utc| utc.with_timezone(&Local).date_naive())
}

/// Aggregate of all readings for one city on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub readings: u32,
    pub avg_temp_c: f64,
    pub min_temp_c: f64,
    pub max_temp_c: f64,
    /// Absent when every matching row predates the humidity column.
    pub avg_humidity_pct: Option<f64>,
    /// Whatever `main` value SQLite co-selects with the aggregates; not a mode.
    pub condition: String,
}

/// One day of a city's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub avg_temp_c: f64,
    pub avg_humidity_pct: Option<f64>,
}
