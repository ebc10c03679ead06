use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::templates::EmailTemplate;
use crate::{Alert, NotificationChannel, NotificationConfig, NotificationError, SmtpTls};

type Transport = AsyncSmtpTransport<Tokio1Executor>;

/// Sends one multipart (plain + HTML) message per alert to every recipient.
pub struct SmtpNotifier {
    transport: Transport,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let (Some(host), Some(from)) = (config.smtp_host.as_deref(), config.smtp_from.as_deref())
        else {
            return Err(NotificationError::Config(
                "SMTP_HOST and SMTP_FROM_ADDRESS are required".into(),
            ));
        };

        let from = from
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::Config(format!("Invalid from address '{}': {}", from, e)))?;
        let to = parse_recipients(&config.smtp_to)?;

        Ok(Self {
            transport: build_transport(config, host)?,
            from,
            to,
        })
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.to
    }

    fn compose(&self, alert: &Alert) -> Result<Message, NotificationError> {
        let builder = self
            .to
            .iter()
            .cloned()
            .fold(Message::builder().from(self.from.clone()), |b, rcpt| b.to(rcpt))
            .subject(format!("[yieldwatch] {}", alert.title));

        builder
            .multipart(MultiPart::alternative_plain_html(
                EmailTemplate::render_plain(alert),
                EmailTemplate::render(alert),
            ))
            .map_err(|e| NotificationError::Smtp(format!("Failed to build email: {}", e)))
    }
}

/// Unparseable addresses are dropped with a warning; at least one must remain.
fn parse_recipients(addresses: &[String]) -> Result<Vec<Mailbox>, NotificationError> {
    let mut mailboxes = Vec::with_capacity(addresses.len());
    for addr in addresses {
        match addr.parse::<Mailbox>() {
            Ok(mailbox) => mailboxes.push(mailbox),
            Err(e) => tracing::warn!("Ignoring recipient '{}': {}", addr, e),
        }
    }

    if mailboxes.is_empty() {
        return Err(NotificationError::Config(
            "No valid NOTIFICATION_EMAIL_TO addresses".into(),
        ));
    }
    Ok(mailboxes)
}

fn build_transport(config: &NotificationConfig, host: &str) -> Result<Transport, NotificationError> {
    let builder = match config.smtp_tls {
        SmtpTls::Tls => Transport::relay(host),
        SmtpTls::StartTls => Transport::starttls_relay(host),
        SmtpTls::None => Ok(Transport::builder_dangerous(host)),
    }
    .map_err(|e| NotificationError::Smtp(format!("SMTP transport error: {}", e)))?
    .port(config.smtp_port)
    .timeout(Some(Duration::from_secs(config.send_timeout_secs.max(1))));

    let builder = match (&config.smtp_username, &config.smtp_password) {
        (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
        _ => builder,
    };

    Ok(builder.build())
}

#[async_trait]
impl NotificationChannel for SmtpNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let email = self.compose(alert)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| NotificationError::Smtp(format!("Failed to send email: {}", e)))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients_drops_invalid() {
        let addrs = vec!["ops@example.com".to_string(), "not an address".to_string()];
        let parsed = parse_recipients(&addrs).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].email.to_string(), "ops@example.com");
    }

    #[test]
    fn test_parse_recipients_requires_one() {
        let addrs = vec!["nope".to_string()];
        assert!(matches!(parse_recipients(&addrs), Err(NotificationError::Config(_))));
    }

    #[test]
    fn test_missing_host_is_config_error() {
        let config = NotificationConfig {
            smtp_from: Some("monitor@example.com".into()),
            smtp_to: vec!["ops@example.com".into()],
            ..NotificationConfig::default()
        };
        assert!(matches!(SmtpNotifier::new(&config), Err(NotificationError::Config(_))));
    }
}
