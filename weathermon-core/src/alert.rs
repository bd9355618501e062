use crate::{
    model::Reading,
    notify::{AlertMessage, Notifier},
};

/// Raises an alert for every reading strictly above the threshold.
///
/// Each call looks at a single reading; there is no memory of earlier breaches.
#[derive(Debug)]
pub struct ThresholdAlerter {
    threshold_c: f64,
    notifier: Box<dyn Notifier>,
}

impl ThresholdAlerter {
    pub fn new(threshold_c: f64, notifier: Box<dyn Notifier>) -> Self {
        Self { threshold_c, notifier }
    }

    pub fn threshold_c(&self) -> f64 {
        self.threshold_c
    }

    pub fn breaches(&self, reading: &Reading) -> bool {
        reading.temperature_c > self.threshold_c
    }

    /// Notify on breach. Returns whether an alert fired; notifier errors are logged, not returned.
    pub async fn check(&self, reading: &Reading) -> bool {
        if !self.breaches(reading) {
            return false;
        }

        tracing::warn!(
            city = %reading.city,
            threshold_c = self.threshold_c,
            "ALERT! High temperature detected in {}: {:.2} °C",
            reading.city,
            reading.temperature_c
        );

        let alert = AlertMessage::for_reading(reading, self.threshold_c);
        if let Err(e) = self.notifier.notify(&alert).await {
            tracing::error!(city = %reading.city, "Failed to send alert: {e:#}");
        }

        true
    }
}
