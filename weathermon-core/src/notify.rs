use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::fmt::Debug;

use crate::{config::SmtpConfig, model::Reading};

/// A rendered high-temperature alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub city: String,
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    pub fn for_reading(reading: &Reading, threshold_c: f64) -> Self {
        let subject = format!("Weather Alert: High Temperature in {}", reading.city);

        let body = format!(
            "Alert! The temperature in {city} has exceeded {threshold_c:.1}°C.\n\n\
             Current Temperature: {temp:.2} °C\n\
             Feels Like: {feels:.2} °C\n\
             Humidity: {humidity}%\n\
             Condition: {condition}",
            city = reading.city,
            temp = reading.temperature_c,
            feels = reading.feels_like_c,
            humidity = reading.humidity_pct,
            condition = reading.condition,
        );

        Self { city: reading.city.clone(), subject, body }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn notify(&self, alert: &AlertMessage) -> Result<()>;
}

/// Sends alerts over STARTTLS SMTP to a fixed recipient.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipient: Mailbox,
}

impl Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("sender", &self.sender.to_string())
            .field("recipient", &self.recipient.to_string())
            .finish_non_exhaustive()
    }
}

impl EmailNotifier {
    pub fn from_config(smtp: &SmtpConfig) -> Result<Self> {
        let sender: Mailbox = smtp
            .sender
            .parse()
            .with_context(|| format!("Invalid sender address '{}'", smtp.sender))?;
        let recipient: Mailbox = smtp
            .recipient
            .parse()
            .with_context(|| format!("Invalid recipient address '{}'", smtp.recipient))?;

        let password = smtp.password.clone().ok_or_else(|| {
            anyhow!(
                "No SMTP password configured.\n\
                 Hint: set it in the [smtp] section or via {}.",
                crate::config::SMTP_PASSWORD_ENV
            )
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .with_context(|| format!("Failed to set up SMTP relay {}", smtp.host))?
            .port(smtp.port)
            .credentials(Credentials::new(smtp.username.clone(), password))
            .build();

        Ok(Self { transport, sender, recipient })
    }

    fn compose(&self, alert: &AlertMessage) -> Result<Message> {
        Message::builder()
            .from(self.sender.clone())
            .to(self.recipient.clone())
            .subject(alert.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(alert.body.clone())
            .context("Failed to build alert email")
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, alert: &AlertMessage) -> Result<()> {
        let email = self.compose(alert)?;

        self.transport
            .send(email)
            .await
            .with_context(|| format!("Failed to send alert email for {}", alert.city))?;

        tracing::info!(city = %alert.city, recipient = %self.recipient, "alert email sent");
        Ok(())
    }
}

/// Fallback when no SMTP settings exist: the alert only goes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &AlertMessage) -> Result<()> {
        tracing::warn!(city = %alert.city, subject = %alert.subject, "{}", alert.body);
        Ok(())
    }
}

/// Pick the email notifier when SMTP is configured, the log notifier otherwise.
pub fn notifier_from_config(smtp: Option<&SmtpConfig>) -> Result<Box<dyn Notifier>> {
    match smtp {
        Some(smtp) => Ok(Box::new(EmailNotifier::from_config(smtp)?)),
        None => {
            tracing::info!("no [smtp] section configured, alerts will only be logged");
            Ok(Box::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hot_reading() -> Reading {
        Reading {
            city: "Chennai".into(),
            temperature_c: 38.456,
            feels_like_c: 42.0,
            humidity_pct: 65,
            condition: "Clear".into(),
            observed_at: 1_700_000_000,
            observed_date: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        }
    }

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "alerts".into(),
            password: Some("secret".into()),
            sender: "alerts@example.com".into(),
            recipient: "ops@example.com".into(),
        }
    }

    #[test]
    fn alert_message_names_city_and_metrics() {
        let alert = AlertMessage::for_reading(&hot_reading(), 35.0);

        assert_eq!(alert.subject, "Weather Alert: High Temperature in Chennai");
        assert!(alert.body.starts_with("Alert! The temperature in Chennai has exceeded 35.0°C."));
        assert!(alert.body.contains("Current Temperature: 38.46 °C"));
        assert!(alert.body.contains("Feels Like: 42.00 °C"));
        assert!(alert.body.contains("Humidity: 65%"));
        assert!(alert.body.ends_with("Condition: Clear"));
    }

    #[tokio::test]
    async fn email_notifier_builds_from_config() {
        let notifier = EmailNotifier::from_config(&smtp()).unwrap();
        let message = notifier.compose(&AlertMessage::for_reading(&hot_reading(), 35.0));
        assert!(message.is_ok());
    }

    #[test]
    fn email_notifier_requires_password() {
        let cfg = SmtpConfig { password: None, ..smtp() };
        let err = EmailNotifier::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No SMTP password configured"));
    }

    #[test]
    fn email_notifier_rejects_bad_addresses() {
        let cfg = SmtpConfig { recipient: "not an address".into(), ..smtp() };
        assert!(EmailNotifier::from_config(&cfg).is_err());
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let alert = AlertMessage::for_reading(&hot_reading(), 35.0);
        assert!(LogNotifier.notify(&alert).await.is_ok());
    }
}
