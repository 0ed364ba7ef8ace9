//! Notification delivery for alerts
//!
//! Every channel implements [`Notifier`]. Implementors provide a single
//! delivery attempt (`deliver`) and channel-specific `validate` checks; the
//! provided `send` validates once and then retries `deliver` with
//! exponential backoff.

mod email;
mod github;
mod slack;
mod webhook;

pub use email::{EmailNotifier, SmtpSettings};
pub use github::{GitHubIssue, GitHubNotifier};
pub use slack::{SlackAttachment, SlackField, SlackNotifier, SlackPayload};
pub use webhook::WebhookNotifier;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use tracing::warn;

use crate::config::NotifiersConfig;
use crate::models::Alert;

/// Settings shared by every notifier
#[derive(Debug, Clone, PartialEq)]
pub struct NotifierOptions {
    /// Disabled notifiers fail validation
    pub enabled: bool,
    /// Total delivery attempts, including the first
    pub retry_attempts: u32,
    /// Base backoff delay, doubled after every failed attempt
    pub retry_delay: Duration,
}

impl Default for NotifierOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl NotifierOptions {
    /// Delay after the failed attempt number `attempt` (zero-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Base validation shared by every notifier
    pub fn ensure_enabled(&self) -> Result<(), NotificationError> {
        if self.enabled {
            Ok(())
        } else {
            Err(NotificationError::Disabled)
        }
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// The notifier was switched off
    #[error("Notifier is not enabled")]
    Disabled,

    /// Missing or malformed settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request failed or got a non-success status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Mail could not be built or relayed
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// Every attempt failed
    #[error("{context} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// What was being sent, e.g. `Slack send`
        context: String,
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last: Box<NotificationError>,
    },
}

/// Result of sending one alert through one channel
#[derive(Debug, Clone)]
pub struct NotificationResult {
    /// Channel the alert was routed to
    pub channel: String,
    /// Id of the rule that fired
    pub alert_id: String,
    /// Agent the alert is about
    pub agent_id: String,
    /// Delivery succeeded
    pub success: bool,
    /// Failure reason when `success` is false
    pub error: Option<String>,
    /// When the send finished
    pub sent_at: DateTime<Utc>,
}

/// A delivery channel for alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs and error messages
    fn name(&self) -> &str;

    /// Shared enable/retry settings
    fn options(&self) -> &NotifierOptions;

    /// Check configuration before sending
    fn validate(&self) -> Result<(), NotificationError> {
        self.options().ensure_enabled()
    }

    /// Make a single delivery attempt
    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationError>;

    /// Validate, then deliver with retry and exponential backoff
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        self.validate()?;

        let context = format!("{} send", self.name());
        retry_with_backoff(self.options(), &context, || self.deliver(alert)).await
    }
}

/// Run `op` up to `options.retry_attempts` times, sleeping
/// `retry_delay * 2^attempt` between failures.
pub async fn retry_with_backoff<F, Fut, T>(
    options: &NotifierOptions,
    context: &str,
    mut op: F,
) -> Result<T, NotificationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NotificationError>>,
{
    let attempts = options.retry_attempts.max(1);
    let mut last = None;

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    context = %context,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %e,
                    "Notification attempt failed"
                );
                last = Some(e);

                if attempt + 1 < attempts {
                    tokio::time::sleep(options.backoff_delay(attempt)).await;
                }
            }
        }
    }

    Err(NotificationError::RetriesExhausted {
        context: context.to_string(),
        attempts,
        last: Box::new(
            last.unwrap_or_else(|| NotificationError::Config("no attempt was made".into())),
        ),
    })
}

/// Plain-text rendering of an alert shared by the text-based channels
pub fn format_alert(alert: &Alert) -> String {
    format!(
        "[{}] {}\nAgent: {} ({})\nTime: {}\nMessage: {}",
        alert.severity.label(),
        alert.name,
        alert.agent_name,
        alert.agent_id,
        iso_timestamp(alert.timestamp),
        alert.message
    )
}

/// Epoch milliseconds as an RFC 3339 UTC timestamp with millisecond precision
pub(crate) fn iso_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("agentwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Send a prepared request and turn transport failures and non-2xx
/// responses into `NotificationError::Http`
pub(crate) async fn send_request(
    request: RequestBuilder,
    service: &str,
) -> Result<(), NotificationError> {
    let response = request
        .send()
        .await
        .map_err(|e| NotificationError::Http(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(NotificationError::Http(format!(
            "{service} returned {status}: {body}"
        )));
    }

    Ok(())
}

/// Build the notifiers configured in `config`, keyed by channel name
pub fn build_notifiers(config: &NotifiersConfig) -> Vec<(String, Arc<dyn Notifier>)> {
    let options = config.options();
    let mut notifiers: Vec<(String, Arc<dyn Notifier>)> = Vec::new();

    if let Some(email) = &config.email {
        let mut notifier = EmailNotifier::new(email.recipients.clone(), options.clone());
        if let Some(smtp) = &email.smtp {
            notifier = notifier.with_smtp(smtp.clone());
        }
        notifiers.push(("email".into(), Arc::new(notifier)));
    }

    if let Some(slack) = &config.slack {
        let mut notifier = SlackNotifier::new(Some(slack.webhook_url.clone()), options.clone())
            .with_timeout(config.request_timeout);
        if let Some(channel) = &slack.channel {
            notifier = notifier.with_channel(channel.clone());
        }
        notifiers.push(("slack".into(), Arc::new(notifier)));
    }

    if let Some(github) = &config.github {
        let mut notifier = GitHubNotifier::new(Some(github.repo.clone()), options.clone())
            .with_auto_create(github.auto_create_issues)
            .with_timeout(config.request_timeout);
        if let Some(token) = &github.token {
            notifier = notifier.with_token(token.clone());
        }
        if let Some(api_base) = &github.api_base {
            notifier = notifier.with_api_base(api_base.clone());
        }
        if let Some(prefix) = &github.label_prefix {
            notifier = notifier.with_label_prefix(prefix.clone());
        }
        notifiers.push(("github".into(), Arc::new(notifier)));
    }

    if let Some(webhook) = &config.webhook {
        let notifier = WebhookNotifier::new(Some(webhook.url.clone()), options)
            .with_headers(webhook.headers.clone())
            .with_timeout(config.request_timeout);
        notifiers.push(("webhook".into(), Arc::new(notifier)));
    }

    notifiers
}
