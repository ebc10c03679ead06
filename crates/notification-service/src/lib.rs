mod desktop;
mod smtp;
mod templates;

pub use desktop::DesktopNotifier;
pub use smtp::SmtpNotifier;
pub use templates::EmailTemplate;

use async_trait::async_trait;
use chrono::NaiveDate;
use curve_core::{TransitionEvent, TransitionKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;

/// Alert types that trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertType {
    Inversion {
        pair_name: String,
        date: NaiveDate,
        long_value: f64,
        short_value: f64,
    },
    Disinversion {
        pair_name: String,
        date: NaiveDate,
        long_value: f64,
        short_value: f64,
    },
}

/// A notification alert to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            timestamp: chrono::Utc::now(),
            title: title.into(),
            message: message.into(),
        }
    }

    /// "Yield Curve Inversion Alert" / "Inversion detected for 10Y vs 2Y on 2024-01-02".
    pub fn from_event(event: &TransitionEvent) -> Self {
        let kind = event.kind();
        let pair_name = event.pair_name.clone();
        let alert_type = match kind {
            TransitionKind::Inversion => AlertType::Inversion {
                pair_name,
                date: event.date,
                long_value: event.long_value,
                short_value: event.short_value,
            },
            TransitionKind::Disinversion => AlertType::Disinversion {
                pair_name,
                date: event.date,
                long_value: event.long_value,
                short_value: event.short_value,
            },
        };

        Self::new(
            alert_type,
            format!("Yield Curve {} Alert", kind.label()),
            event.to_string(),
        )
    }

    pub fn pair_name(&self) -> &str {
        match &self.alert_type {
            AlertType::Inversion { pair_name, .. } | AlertType::Disinversion { pair_name, .. } => {
                pair_name
            }
        }
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Desktop notification error: {0}")]
    Desktop(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub desktop_enabled: bool,
    pub desktop_timeout_secs: u32,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
    pub discord_webhook_url: Option<String>,
    /// Upper bound for one SMTP or webhook delivery.
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone, Default)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            desktop_enabled: false,
            desktop_timeout_secs: 10,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
            smtp_to: Vec::new(),
            smtp_tls: SmtpTls::default(),
            discord_webhook_url: None,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
        }
    }
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset. Desktop
    /// notifications are opt-in, matching `Default`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let smtp_to = get("NOTIFICATION_EMAIL_TO")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let smtp_tls = match get("SMTP_TLS").unwrap_or_default().to_ascii_lowercase().as_str() {
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            desktop_enabled: get("DESKTOP_NOTIFICATIONS")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.desktop_enabled),
            desktop_timeout_secs: parsed(get("DESKTOP_NOTIFICATION_TIMEOUT"))
                .unwrap_or(defaults.desktop_timeout_secs),
            smtp_host: get("SMTP_HOST"),
            smtp_port: parsed(get("SMTP_PORT")).unwrap_or(defaults.smtp_port),
            smtp_username: get("SMTP_USERNAME"),
            smtp_password: get("SMTP_PASSWORD"),
            smtp_from: get("SMTP_FROM_ADDRESS"),
            smtp_to,
            smtp_tls,
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            send_timeout_secs: parsed(get("NOTIFICATION_TIMEOUT_SECS"))
                .unwrap_or(defaults.send_timeout_secs),
        }
    }
}

fn parsed<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|s| s.parse().ok())
}

/// Outcome of dispatching one alert to every channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn all_failed(&self) -> bool {
        self.delivered == 0 && self.failed > 0
    }
}

/// Dispatches alerts to all configured channels.
pub struct NotificationService {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = vec![Box::new(LogNotifier)];

        if config.desktop_enabled {
            channels.push(Box::new(DesktopNotifier::new(config.desktop_timeout_secs)));
            tracing::debug!("Desktop notifications enabled");
        }

        // Add SMTP channel if configured
        if config.smtp_host.is_some() && config.smtp_from.is_some() && !config.smtp_to.is_empty() {
            match SmtpNotifier::new(config) {
                Ok(notifier) => {
                    tracing::info!(
                        "Email notifications enabled (SMTP -> {} recipients)",
                        config.smtp_to.len()
                    );
                    channels.push(Box::new(notifier));
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP notifier: {}", e);
                }
            }
        }

        if let Some(ref webhook_url) = config.discord_webhook_url {
            let timeout = Duration::from_secs(config.send_timeout_secs.max(1));
            match DiscordWebhookNotifier::new(webhook_url.clone(), timeout) {
                Ok(notifier) => {
                    channels.push(Box::new(notifier));
                    tracing::info!("Discord webhook notifications enabled");
                }
                Err(e) => tracing::warn!("Failed to initialize Discord notifier: {}", e),
            }
        }

        Self { channels }
    }

    /// Build a service over an explicit channel list.
    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Try every channel once. Failures are logged and counted, never propagated.
    pub async fn send_alert_async(&self, alert: &Alert) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for channel in self.channels.iter() {
            match channel.send(alert).await {
                Ok(()) => {
                    report.delivered += 1;
                    tracing::debug!("Sent notification via {}", channel.name());
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        "Notification failed for {} via {}: {}",
                        alert.pair_name(),
                        channel.name(),
                        e
                    );
                }
            }
        }
        report
    }
}

/// Writes alerts to the log. Always installed.
pub struct LogNotifier;

#[async_trait]
impl NotificationChannel for LogNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        tracing::info!(pair = alert.pair_name(), "{}", alert.message);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Discord webhook notifier.
pub struct DiscordWebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    /// `timeout` bounds the whole request, so an endpoint that never answers
    /// fails the delivery instead of stalling the run.
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Config(format!("Discord HTTP client: {}", e)))?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let (color, long_value, short_value) = match &alert.alert_type {
            AlertType::Inversion { long_value, short_value, .. } => (0xff0000, long_value, short_value),
            AlertType::Disinversion { long_value, short_value, .. } => (0x00ff00, long_value, short_value),
        };

        let payload = serde_json::json!({
            "username": "yieldwatch",
            "embeds": [{
                "title": alert.title,
                "description": alert.message,
                "color": color,
                "fields": [
                    { "name": "Long", "value": format!("{:.2}%", long_value), "inline": true },
                    { "name": "Short", "value": format!("{:.2}%", short_value), "inline": true },
                    { "name": "Spread", "value": format!("{:+.2}", long_value - short_value), "inline": true },
                ],
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NotificationError::Discord(e.without_url().to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_core::CurveState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn inversion() -> TransitionEvent {
        TransitionEvent {
            pair_name: "10Y vs 2Y".to_string(),
            date: NaiveDate::from_ymd_opt(2022, 7, 6).unwrap(),
            from_state: CurveState::Normal,
            to_state: CurveState::Inverted,
            long_value: 2.93,
            short_value: 2.98,
        }
    }

    struct CountingChannel {
        sent: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        async fn send(&self, _alert: &Alert) -> Result<(), NotificationError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct FailingChannel;

    #[async_trait]
    impl NotificationChannel for FailingChannel {
        async fn send(&self, _alert: &Alert) -> Result<(), NotificationError> {
            Err(NotificationError::Desktop("no display".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_alert_from_event() {
        let alert = Alert::from_event(&inversion());
        assert_eq!(alert.title, "Yield Curve Inversion Alert");
        assert_eq!(alert.message, "Inversion detected for 10Y vs 2Y on 2022-07-06");
        assert_eq!(alert.pair_name(), "10Y vs 2Y");
        assert!(matches!(alert.alert_type, AlertType::Inversion { .. }));

        let mut event = inversion();
        event.from_state = CurveState::Inverted;
        event.to_state = CurveState::Normal;
        let alert = Alert::from_event(&event);
        assert_eq!(alert.title, "Yield Curve Disinversion Alert");
        assert!(matches!(alert.alert_type, AlertType::Disinversion { .. }));
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_others() {
        let sent = Arc::new(AtomicUsize::new(0));
        let service = NotificationService::with_channels(vec![
            Box::new(FailingChannel),
            Box::new(CountingChannel { sent: sent.clone() }),
        ]);

        let report = service.send_alert_async(&Alert::from_event(&inversion())).await;

        assert_eq!(report, DeliveryReport { delivered: 1, failed: 1 });
        assert!(!report.all_failed());
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_channels_failing() {
        let service = NotificationService::with_channels(vec![Box::new(FailingChannel)]);
        let report = service.send_alert_async(&Alert::from_event(&inversion())).await;
        assert!(report.all_failed());
    }

    #[tokio::test]
    async fn test_silent_webhook_times_out_instead_of_hanging() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection without ever answering.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let webhook = DiscordWebhookNotifier::new(
            format!("http://{}/api/webhooks/1/token", addr),
            Duration::from_millis(300),
        )
        .unwrap();
        let sent = Arc::new(AtomicUsize::new(0));
        let service = NotificationService::with_channels(vec![
            Box::new(webhook),
            Box::new(CountingChannel { sent: sent.clone() }),
        ]);

        let report = tokio::time::timeout(
            Duration::from_secs(10),
            service.send_alert_async(&Alert::from_event(&inversion())),
        )
        .await
        .expect("delivery must finish once the webhook times out");

        assert_eq!(report, DeliveryReport { delivered: 1, failed: 1 });
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_desktop_is_opt_in_everywhere() {
        let from_empty_env = NotificationConfig::from_lookup(|_| None);
        assert!(!from_empty_env.desktop_enabled);
        assert_eq!(from_empty_env.desktop_enabled, NotificationConfig::default().desktop_enabled);
        assert_eq!(from_empty_env.send_timeout_secs, DEFAULT_SEND_TIMEOUT_SECS);

        let enabled = NotificationConfig::from_lookup(|key| match key {
            "DESKTOP_NOTIFICATIONS" => Some("true".to_string()),
            "NOTIFICATION_TIMEOUT_SECS" => Some("5".to_string()),
            "SMTP_TLS" => Some("TLS".to_string()),
            _ => None,
        });
        assert!(enabled.desktop_enabled);
        assert_eq!(enabled.send_timeout_secs, 5);
        assert!(matches!(enabled.smtp_tls, SmtpTls::Tls));

        let disabled = NotificationConfig::from_lookup(|key| {
            (key == "DESKTOP_NOTIFICATIONS").then(|| "off".to_string())
        });
        assert!(!disabled.desktop_enabled);
    }

    #[test]
    fn test_default_service_has_log_channel_only() {
        let service = NotificationService::new(&NotificationConfig::default());
        assert_eq!(service.channel_names(), vec!["log"]);
    }
}
