//! The polling loop.
//!
//! Every tick fetches each configured city in order, stores what came back and
//! runs the threshold check on it. Once per day, on the first tick at or after
//! the configured time, the daily report for that date is produced.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;

use crate::{
    Config,
    alert::ThresholdAlerter,
    provider::WeatherProvider,
    store::ReadingStore,
    summary::{DailyReport, daily_report},
};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub cities: Vec<String>,
    pub poll_interval: Duration,
    pub summary_time: NaiveTime,
}

impl MonitorConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            cities: config.cities.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            summary_time: config.summary_time()?,
        })
    }
}

/// Outcome counts of one pass over the city list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub stored: usize,
    pub failed: usize,
    pub alerts: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub cycle: CycleReport,
    pub summary: Option<DailyReport>,
}

pub struct Monitor {
    config: MonitorConfig,
    provider: Box<dyn WeatherProvider>,
    store: Arc<dyn ReadingStore>,
    alerter: ThresholdAlerter,
    clock: Box<dyn Clock>,
    last_summary: Option<NaiveDate>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        provider: Box<dyn WeatherProvider>,
        store: Arc<dyn ReadingStore>,
        alerter: ThresholdAlerter,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self { config, provider, store, alerter, clock, last_summary: None }
    }

    pub async fn poll_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for city in &self.config.cities {
            let reading = match self.provider.fetch_reading(city).await {
                Ok(reading) => reading,
                Err(e) => {
                    tracing::warn!(city = %city, "Error fetching weather data: {e}");
                    report.failed += 1;
                    continue;
                }
            };

            if let Err(e) = self.store.append(&reading) {
                tracing::error!(city = %city, "Error storing weather data: {e:#}");
                report.failed += 1;
                continue;
            }

            tracing::info!(
                city = %city,
                temperature_c = format_args!("{:.2}", reading.temperature_c),
                humidity_pct = reading.humidity_pct,
                condition = %reading.condition,
                "reading stored"
            );
            report.stored += 1;

            if self.alerter.check(&reading).await {
                report.alerts += 1;
            }
        }

        report
    }

    pub fn summary_due(&self, now: DateTime<Local>) -> bool {
        now.time() >= self.config.summary_time && self.last_summary != Some(now.date_naive())
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let cycle = self.poll_cycle().await;
        tracing::debug!(?cycle, "poll cycle finished");

        let now = self.clock.now();
        let mut summary = None;

        if self.summary_due(now) {
            let today = now.date_naive();
            match daily_report(&*self.store, &self.config.cities, today) {
                Ok(report) => {
                    self.last_summary = Some(today);
                    summary = Some(report);
                }
                Err(e) => tracing::error!("Error generating daily summary: {e:#}"),
            }
        }

        TickOutcome { cycle, summary }
    }

    /// Tick on the poll interval until Ctrl-C. Slow cycles delay the next tick instead of bunching.
    pub async fn run<F>(&mut self, on_summary: F) -> Result<()>
    where
        F: FnMut(&DailyReport),
    {
        self.run_until(on_summary, tokio::signal::ctrl_c()).await
    }

    /// Like [`Monitor::run`], but stops once `shutdown` resolves, including
    /// in the middle of a poll cycle. Readings stored before that are kept.
    pub async fn run_until<F, S>(&mut self, mut on_summary: F, shutdown: S) -> Result<()>
    where
        F: FnMut(&DailyReport),
        S: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            cities = ?self.config.cities,
            interval_secs = self.config.poll_interval.as_secs(),
            threshold_c = self.alerter.threshold_c(),
            "monitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                res = &mut shutdown => {
                    res?;
                    tracing::info!("shutdown requested, stopping monitor");
                    return Ok(());
                }
            }

            let outcome = tokio::select! {
                outcome = self.tick() => outcome,
                res = &mut shutdown => {
                    res?;
                    tracing::info!("shutdown requested during a poll cycle, stopping monitor");
                    return Ok(());
                }
            };

            if let Some(report) = &outcome.summary {
                on_summary(report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::FetchError,
        model::Reading,
        notify::{AlertMessage, Notifier},
        store::SqliteStore,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeProvider {
        temps: Vec<(&'static str, f64)>,
        fail_for: Vec<&'static str>,
        epoch: i64,
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn fetch_reading(&self, city: &str) -> Result<Reading, FetchError> {
            if self.fail_for.iter().any(|c| *c == city) {
                return Err(FetchError::Malformed {
                    city: city.to_string(),
                    reason: "simulated outage".into(),
                });
            }

            let temp = self
                .temps
                .iter()
                .find(|(c, _)| *c == city)
                .map(|(_, t)| *t)
                .unwrap_or(25.0);

            Ok(Reading::new(city, temp, temp, 50, "Clear", self.epoch).unwrap())
        }
    }

    #[derive(Debug, Default)]
    struct CountingNotifier(Arc<AtomicUsize>);

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _alert: &AlertMessage) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeClock(Arc<Mutex<DateTime<Local>>>);

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Local> {
            *self.0.lock()
        }
    }

    fn local(h: u32, m: u32, day: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, day, h, m, 0).earliest().unwrap()
    }

    fn cities() -> Vec<String> {
        ["Delhi", "Mumbai", "Chennai"].iter().map(|c| c.to_string()).collect()
    }

    struct Harness {
        monitor: Monitor,
        store: Arc<SqliteStore>,
        alerts: Arc<AtomicUsize>,
        clock: Arc<Mutex<DateTime<Local>>>,
    }

    /// Takes a fixed amount of (tokio) time per fetch.
    #[derive(Debug)]
    struct SlowProvider {
        delay: Duration,
        epoch: i64,
    }

    #[async_trait]
    impl WeatherProvider for SlowProvider {
        async fn fetch_reading(&self, city: &str) -> Result<Reading, FetchError> {
            tokio::time::sleep(self.delay).await;
            Ok(Reading::new(city, 25.0, 25.0, 50, "Clear", self.epoch).unwrap())
        }
    }

    fn slow_provider() -> SlowProvider {
        SlowProvider { delay: Duration::from_millis(800), epoch: local(12, 0, 20).timestamp() }
    }

    fn harness(provider: impl WeatherProvider + 'static, start: DateTime<Local>) -> Harness {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let alerts = Arc::new(AtomicUsize::new(0));
        let clock = Arc::new(Mutex::new(start));

        let config = MonitorConfig {
            cities: cities(),
            poll_interval: Duration::from_secs(20),
            summary_time: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
        };

        let monitor = Monitor::new(
            config,
            Box::new(provider),
            store.clone(),
            ThresholdAlerter::new(35.0, Box::new(CountingNotifier(alerts.clone()))),
            Box::new(FakeClock(clock.clone())),
        );

        Harness { monitor, store, alerts, clock }
    }

    fn provider(fail_for: Vec<&'static str>) -> FakeProvider {
        FakeProvider {
            temps: vec![("Delhi", 40.0), ("Mumbai", 30.0), ("Chennai", 35.0)],
            fail_for,
            epoch: local(12, 0, 20).timestamp(),
        }
    }

    #[tokio::test]
    async fn failed_city_does_not_block_the_others() {
        let h = harness(provider(vec!["Mumbai"]), local(12, 0, 20));

        let report = h.monitor.poll_cycle().await;

        assert_eq!(report, CycleReport { stored: 2, failed: 1, alerts: 1 });

        let day = local(12, 0, 20).date_naive();
        assert!(h.store.query_day("Delhi", day).unwrap().is_some());
        assert!(h.store.query_day("Mumbai", day).unwrap().is_none());
        assert!(h.store.query_day("Chennai", day).unwrap().is_some());
    }

    #[tokio::test]
    async fn only_breaching_readings_alert() {
        let h = harness(provider(vec![]), local(12, 0, 20));

        let report = h.monitor.poll_cycle().await;

        // Delhi at 40 breaches; Chennai at exactly 35 does not.
        assert_eq!(report.alerts, 1);
        assert_eq!(h.alerts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn summary_is_emitted_once_per_day_after_the_configured_time() {
        let mut h = harness(provider(vec![]), local(12, 0, 20));

        assert!(h.monitor.tick().await.summary.is_none());

        *h.clock.lock() = local(23, 59, 20);
        let outcome = h.monitor.tick().await;
        let report = outcome.summary.expect("summary due at 23:59");
        assert_eq!(report.date, local(23, 59, 20).date_naive());
        assert_eq!(report.cities.len(), 3);
        assert!(report.cities.iter().all(|c| c.summary.is_some()));
        assert_eq!(report.cities[0].summary.as_ref().unwrap().readings, 2);

        assert!(h.monitor.tick().await.summary.is_none());

        *h.clock.lock() = local(0, 5, 21);
        assert!(h.monitor.tick().await.summary.is_none());

        *h.clock.lock() = local(23, 59, 21);
        let next = h.monitor.tick().await.summary.expect("next day's summary");
        assert_eq!(next.date, local(23, 59, 21).date_naive());
        // Readings carry the 20th's timestamp, so the 21st has none.
        assert!(!next.has_data());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_a_cycle_stops_without_finishing_it() {
        let mut h = harness(slow_provider(), local(12, 0, 20));
        let started = tokio::time::Instant::now();

        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(1300)).await;
            Ok(())
        };

        let res =
            tokio::time::timeout(Duration::from_secs(5), h.monitor.run_until(|_| {}, shutdown))
                .await;

        assert!(matches!(res, Ok(Ok(()))), "run_until must return once shutdown fires");
        // A full cycle over three cities takes 2.4 s.
        assert!(started.elapsed() < Duration::from_millis(2400));

        let day = local(12, 0, 20).date_naive();
        assert!(h.store.query_day("Delhi", day).unwrap().is_some());
        assert!(h.store.query_day("Mumbai", day).unwrap().is_none());
        assert!(h.store.query_day("Chennai", day).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_idle_stops_before_the_next_tick() {
        let mut h = harness(slow_provider(), local(12, 0, 20));
        let started = tokio::time::Instant::now();

        let shutdown = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };

        let res =
            tokio::time::timeout(Duration::from_secs(30), h.monitor.run_until(|_| {}, shutdown))
                .await;

        assert!(matches!(res, Ok(Ok(()))));
        assert!(started.elapsed() < Duration::from_secs(20));
        let chennai = h.store.query_day("Chennai", local(12, 0, 20).date_naive()).unwrap();
        assert_eq!(chennai.unwrap().readings, 1);
    }

    #[test]
    fn monitor_config_validates_source_config() {
        let cfg = Config { poll_interval_secs: 20, ..Config::default() };
        let mc = MonitorConfig::from_config(&cfg).unwrap();
        assert_eq!(mc.poll_interval, Duration::from_secs(20));
        assert_eq!(mc.cities.len(), 6);

        let bad = Config { cities: vec![], ..Config::default() };
        assert!(MonitorConfig::from_config(&bad).is_err());
    }
}
