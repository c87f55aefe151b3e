//! Outbound alerts.
//!
//! Mail goes out through an HTTP relay (any webhook-to-SMTP bridge):
//! the daemon posts the message as JSON and the relay handles SMTP,
//! TLS and credentials. Delivery is best effort; the alarm controller
//! dispatches alerts on background tasks and only records the outcome.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::types::Timestamp;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub subject: String,
    pub html: String,
}

impl Alert {
    /// The alert sent when the alarm fires.
    pub fn sound_detected(at: Timestamp) -> Self {
        Self {
            subject: "Earshot alarm: sound detected".to_string(),
            html: format!(
                "<h3>Earshot alarm</h3>\n\
                 <p>Sound detected at <b>{}</b>.</p>\n\
                 <p>The buzzer is now ON until reset.</p>\n",
                at.long()
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier not configured ({0} missing)")]
    NotConfigured(&'static str),

    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("relay rejected message: HTTP {0}")]
    Rejected(reqwest::StatusCode),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Relay settings; every field is optional so a device without mail
/// set up still runs, it just logs a warning on every alarm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let url = self
            .config
            .url
            .as_deref()
            .ok_or(NotifyError::NotConfigured("EARSHOT_NOTIFY_URL"))?;
        let to = self
            .config
            .to
            .as_deref()
            .ok_or(NotifyError::NotConfigured("EARSHOT_NOTIFY_TO"))?;

        let mut request = self.client.post(url).json(&RelayMessage {
            to,
            subject: &alert.subject,
            html: &alert.html,
        });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn alarm_alert_names_detection_time() {
        let alert = Alert::sound_detected(Timestamp::from_datetime(datetime!(
            2025-06-01 22:10:00 UTC
        )));
        assert!(alert.html.contains("2025-06-01 22:10:00"));
        assert!(alert.html.contains("until reset"));
    }

    #[tokio::test]
    async fn unconfigured_relay_is_reported_without_io() {
        let notifier = WebhookNotifier::new(WebhookConfig::default());
        let alert = Alert {
            subject: "s".into(),
            html: "b".into(),
        };

        let err = notifier.notify(&alert).await.unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured("EARSHOT_NOTIFY_URL")));
        assert_eq!(
            err.to_string(),
            "notifier not configured (EARSHOT_NOTIFY_URL missing)"
        );
    }

    #[tokio::test]
    async fn missing_recipient_is_a_configuration_error() {
        let notifier = WebhookNotifier::new(WebhookConfig {
            url: Some("http://127.0.0.1:9/relay".into()),
            ..Default::default()
        });
        let alert = Alert {
            subject: "s".into(),
            html: "b".into(),
        };

        assert!(matches!(
            notifier.notify(&alert).await,
            Err(NotifyError::NotConfigured("EARSHOT_NOTIFY_TO"))
        ));
    }
}
