use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{format_alert, NotificationError, Notifier, NotifierOptions};
use crate::models::Alert;

/// SMTP relay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtpSettings {
    /// Relay host name
    pub host: String,
    /// Relay port, 587 by default
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Login user; no authentication when absent
    #[serde(default)]
    pub username: Option<String>,
    /// Login password
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Emails alerts to a list of recipients.
///
/// Without SMTP settings the notifier only logs what it would have sent.
pub struct EmailNotifier {
    recipients: Vec<String>,
    provider: String,
    smtp: Option<SmtpSettings>,
    options: NotifierOptions,
}

impl EmailNotifier {
    /// Log-only notifier for `recipients`
    pub fn new(recipients: Vec<String>, options: NotifierOptions) -> Self {
        let mut notifier = Self {
            recipients: Vec::new(),
            provider: "smtp".to_string(),
            smtp: None,
            options,
        };
        for recipient in recipients {
            notifier.add_recipient(recipient);
        }
        notifier
    }

    /// Deliver through an SMTP relay
    pub fn with_smtp(mut self, smtp: SmtpSettings) -> Self {
        self.smtp = Some(smtp);
        self
    }

    /// Delivery provider name
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Current recipients
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Add a recipient; duplicates are ignored
    pub fn add_recipient(&mut self, email: impl Into<String>) {
        let email = email.into();
        if !self.recipients.contains(&email) {
            self.recipients.push(email);
        }
    }

    /// Remove a recipient if present
    pub fn remove_recipient(&mut self, email: &str) {
        self.recipients.retain(|r| r != email);
    }

    /// Replace the SMTP relay settings
    pub fn set_smtp(&mut self, smtp: SmtpSettings) {
        self.smtp = Some(smtp);
    }

    fn subject(alert: &Alert) -> String {
        format!("[{}] {} - {}", alert.severity.label(), alert.name, alert.agent_name)
    }

    fn build_message(&self, smtp: &SmtpSettings, alert: &Alert) -> Result<Message, NotificationError> {
        let from: Mailbox = smtp
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotificationError::Config(e.to_string()))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(Self::subject(alert))
            .header(ContentType::TEXT_PLAIN);

        for recipient in &self.recipients {
            let to: Mailbox = recipient.parse().map_err(|e: lettre::address::AddressError| {
                NotificationError::Config(format!("invalid recipient '{recipient}': {e}"))
            })?;
            builder = builder.to(to);
        }

        builder
            .body(format_alert(alert))
            .map_err(|e| NotificationError::Smtp(e.to_string()))
    }

    fn transport(smtp: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| NotificationError::Smtp(e.to_string()))?
            .port(smtp.port);

        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "Email"
    }

    fn options(&self) -> &NotifierOptions {
        &self.options
    }

    fn validate(&self) -> Result<(), NotificationError> {
        self.options.ensure_enabled()?;
        if self.recipients.is_empty() {
            return Err(NotificationError::Config(
                "Email notifier: no recipients configured".into(),
            ));
        }
        Ok(())
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationError> {
        let Some(smtp) = &self.smtp else {
            info!(
                alert_id = %alert.id,
                recipients = ?self.recipients,
                subject = %Self::subject(alert),
                "No SMTP relay configured, email not sent"
            );
            return Ok(());
        };

        let message = self.build_message(smtp, alert)?;
        Self::transport(smtp)?
            .send(message)
            .await
            .map_err(|e| NotificationError::Smtp(e.to_string()))?;

        debug!(alert_id = %alert.id, recipients = self.recipients.len(), "Sent email notification");
        Ok(())
    }
}
