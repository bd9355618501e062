use anyhow::{Context, Result};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use std::{fs, path::Path};

use crate::model::{DailySummary, Reading, SeriesPoint};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Append-only persistence for readings.
pub trait ReadingStore: Send + Sync {
    /// Ensure the backing table exists with the current schema. Idempotent.
    fn init(&self) -> Result<()>;

    /// Insert one reading and return its surrogate id.
    fn append(&self, reading: &Reading) -> Result<i64>;

    /// Aggregate one city's readings for `date`; `None` when there are none.
    fn query_day(&self, city: &str, date: NaiveDate) -> Result<Option<DailySummary>>;

    /// Per-date averages for a city, ascending by date.
    fn query_series(&self, city: &str) -> Result<Vec<SeriesPoint>>;

    /// Every city with at least one stored reading, sorted.
    fn cities(&self) -> Result<Vec<String>>;
}

/// SQLite-backed reading store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open weather database: {}", path.display()))?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn: Mutex::new(conn) };
        store.init()?;
        Ok(store)
    }

    /// Tables written before humidity was tracked lack the column.
    fn add_humidity_column(conn: &Connection) -> Result<()> {
        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(weather)")?
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;

        if !columns.iter().any(|name| name == "humidity") {
            conn.execute("ALTER TABLE weather ADD COLUMN humidity INTEGER", [])
                .context("Failed to add humidity column")?;
            tracing::info!("added humidity column to weather table");
        }

        Ok(())
    }
}

impl ReadingStore for SqliteStore {
    fn init(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS weather (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city TEXT NOT NULL,
                temp REAL NOT NULL,
                feels_like REAL NOT NULL,
                humidity INTEGER,
                main TEXT NOT NULL,
                dt INTEGER NOT NULL,
                date TEXT NOT NULL
            );",
        )
        .context("Failed to initialize schema")?;

        Self::add_humidity_column(&conn)?;

        conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_weather_city_date ON weather(city, date);")
            .context("Failed to create weather index")?;

        Ok(())
    }

    fn append(&self, reading: &Reading) -> Result<i64> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO weather (city, temp, feels_like, humidity, main, dt, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                reading.city,
                reading.temperature_c,
                reading.feels_like_c,
                reading.humidity_pct,
                reading.condition,
                reading.observed_at,
                reading.observed_date.format(DATE_FORMAT).to_string(),
            ],
        )
        .with_context(|| format!("Failed to store reading for {}", reading.city))?;

        Ok(conn.last_insert_rowid())
    }

    fn query_day(&self, city: &str, date: NaiveDate) -> Result<Option<DailySummary>> {
        let conn = self.conn.lock();
        let date = date.format(DATE_FORMAT).to_string();

        // `main` is a bare column next to the aggregates, so SQLite picks it
        // from an arbitrary matching row.
        let row = conn
            .query_row(
                "SELECT COUNT(*), AVG(temp), MIN(temp), MAX(temp), AVG(humidity), main
                 FROM weather WHERE city = ?1 AND date = ?2",
                params![city, date],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .with_context(|| format!("Failed to aggregate readings for {city} on {date}"))?;

        let summary = match row {
            (readings, Some(avg), Some(min), Some(max), avg_humidity, condition)
                if readings > 0 =>
            {
                Some(DailySummary {
                    readings,
                    avg_temp_c: avg,
                    min_temp_c: min,
                    max_temp_c: max,
                    avg_humidity_pct: avg_humidity,
                    condition: condition.unwrap_or_else(|| "Unknown".to_string()),
                })
            }
            _ => None,
        };

        Ok(summary)
    }

    fn query_series(&self, city: &str) -> Result<Vec<SeriesPoint>> {
        let conn = self.conn.lock();

        let rows = conn
            .prepare(
                "SELECT date, AVG(temp), AVG(humidity)
                 FROM weather
                 WHERE city = ?1
                 GROUP BY date
                 ORDER BY date",
            )?
            .query_map(params![city], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to load series for {city}"))?;

        // Dates holding only legacy rows without a temperature have nothing to plot.
        rows.into_iter()
            .filter_map(|(date, avg_temp_c, avg_humidity_pct)| {
                avg_temp_c.map(|t| (date, t, avg_humidity_pct))
            })
            .map(|(date, avg_temp_c, avg_humidity_pct)| {
                let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                    .with_context(|| format!("Stored date '{date}' for {city} is not YYYY-MM-DD"))?;
                Ok(SeriesPoint { date, avg_temp_c, avg_humidity_pct })
            })
            .collect()
    }

    fn cities(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();

        let cities = conn
            .prepare("SELECT DISTINCT city FROM weather ORDER BY city")?
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list stored cities")?;

        Ok(cities)
    }
}
