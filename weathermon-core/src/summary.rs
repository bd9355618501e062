use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::{model::DailySummary, store::ReadingStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitySummary {
    pub city: String,
    /// `None` when the store holds no readings for the city on that date.
    pub summary: Option<DailySummary>,
}

/// Per-city aggregates for one date, in configured city order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub cities: Vec<CitySummary>,
}

impl DailyReport {
    pub fn has_data(&self) -> bool {
        self.cities.iter().any(|c| c.summary.is_some())
    }
}

pub fn daily_report<S>(store: &S, cities: &[String], date: NaiveDate) -> Result<DailyReport>
where
    S: ReadingStore + ?Sized,
{
    let cities = cities
        .iter()
        .map(|city| -> Result<CitySummary> {
            Ok(CitySummary {
                city: city.clone(),
                summary: store.query_day(city, date)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DailyReport { date, cities })
}

impl fmt::Display for DailyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.cities {
            let Some(s) = &entry.summary else {
                writeln!(f, "\nSummary for {} on {}: no data", entry.city, self.date)?;
                continue;
            };

            writeln!(f, "\nSummary for {} on {}:", entry.city, self.date)?;
            writeln!(f, "Average Temperature: {:.2} °C", s.avg_temp_c)?;
            writeln!(f, "Min Temperature: {:.2} °C", s.min_temp_c)?;
            writeln!(f, "Max Temperature: {:.2} °C", s.max_temp_c)?;
            match s.avg_humidity_pct {
                Some(h) => writeln!(f, "Average Humidity: {h:.2}%")?,
                None => writeln!(f, "Average Humidity: n/a")?,
            }
            writeln!(f, "Dominant Condition: {}", s.condition)?;
        }
        Ok(())
    }
}
