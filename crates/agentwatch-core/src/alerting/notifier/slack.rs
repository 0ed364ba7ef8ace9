use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{http_client, iso_timestamp, send_request, NotificationError, Notifier, NotifierOptions};
use crate::models::{Alert, Severity};

const SLACK_HOOKS_HOST: &str = "hooks.slack.com";

/// Slack incoming-webhook message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackPayload {
    /// Fallback text shown in notifications
    pub text: String,
    /// Channel override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Colored detail blocks
    pub attachments: Vec<SlackAttachment>,
}

/// Colored block of fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackAttachment {
    /// Hex color for the alert severity
    pub color: &'static str,
    /// Title/value pairs
    pub fields: Vec<SlackField>,
}

/// One title/value pair in an attachment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackField {
    /// Field label
    pub title: &'static str,
    /// Field text
    pub value: String,
    /// Render side by side with the next short field
    pub short: bool,
}

/// Posts alerts to a Slack incoming webhook
pub struct SlackNotifier {
    webhook_url: Option<String>,
    channel: Option<String>,
    options: NotifierOptions,
    client: Client,
}

impl SlackNotifier {
    /// Notifier for `webhook_url`; `None` leaves it unconfigured
    pub fn new(webhook_url: Option<String>, options: NotifierOptions) -> Self {
        Self {
            webhook_url,
            channel: None,
            options,
            client: http_client(Duration::from_secs(30)),
        }
    }

    /// Override the channel configured on the webhook
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// HTTP request timeout, 30 s by default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Configured webhook URL
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// Replace the webhook URL. Only `https://hooks.slack.com/...` is accepted.
    pub fn set_webhook_url(&mut self, url: &str) -> Result<(), NotificationError> {
        let parsed = Url::parse(url)
            .map_err(|e| NotificationError::Config(format!("Invalid Slack webhook URL: {e}")))?;

        if parsed.scheme() != "https" || parsed.host_str() != Some(SLACK_HOOKS_HOST) {
            return Err(NotificationError::Config("Invalid Slack webhook URL".into()));
        }

        self.webhook_url = Some(url.to_string());
        Ok(())
    }

    /// Build the webhook payload for an alert
    pub fn format_message(&self, alert: &Alert) -> SlackPayload {
        let severity = alert.severity.label();

        SlackPayload {
            text: format!("{severity}: {}", alert.name),
            channel: self.channel.clone(),
            attachments: vec![SlackAttachment {
                color: severity_color(alert.severity),
                fields: vec![
                    SlackField {
                        title: "Agent",
                        value: alert.agent_name.clone(),
                        short: true,
                    },
                    SlackField {
                        title: "Severity",
                        value: severity.to_string(),
                        short: true,
                    },
                    SlackField {
                        title: "Message",
                        value: alert.message.clone(),
                        short: false,
                    },
                    SlackField {
                        title: "Time",
                        value: iso_timestamp(alert.timestamp),
                        short: false,
                    },
                ],
            }],
        }
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#E74C3C",
        Severity::Warning => "#F39C12",
        Severity::Info => "#3498DB",
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "Slack"
    }

    fn options(&self) -> &NotifierOptions {
        &self.options
    }

    fn validate(&self) -> Result<(), NotificationError> {
        self.options.ensure_enabled()?;
        match self.webhook_url.as_deref() {
            Some(url) if !url.is_empty() => Ok(()),
            _ => Err(NotificationError::Config(
                "Slack notifier: webhookUrl not configured".into(),
            )),
        }
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationError> {
        let url = self.webhook_url.as_deref().ok_or_else(|| {
            NotificationError::Config("Slack notifier: webhookUrl not configured".into())
        })?;

        let payload = self.format_message(alert);
        send_request(self.client.post(url).json(&payload), "Slack").await?;

        debug!(alert_id = %alert.id, agent_id = %alert.agent_id, "Sent Slack notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::notifier::tests::sample_alert;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> NotifierOptions {
        NotifierOptions {
            retry_delay: Duration::from_millis(1),
            ..NotifierOptions::default()
        }
    }

    #[test]
    fn test_missing_webhook_fails_validation() {
        let notifier = SlackNotifier::new(None, NotifierOptions::default());
        let err = notifier.validate().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Slack notifier: webhookUrl not configured");
    }

    #[test]
    fn test_set_webhook_url_requires_slack_host() {
        let mut notifier = SlackNotifier::new(None, NotifierOptions::default());

        assert!(notifier.set_webhook_url("http://hooks.slack.com/services/x").is_err());
        assert!(notifier.set_webhook_url("https://example.com/hook").is_err());
        assert!(notifier.set_webhook_url("not a url").is_err());
        assert_eq!(notifier.webhook_url(), None);

        notifier
            .set_webhook_url("https://hooks.slack.com/services/T0/B0/xyz")
            .unwrap();
        assert_eq!(
            notifier.webhook_url(),
            Some("https://hooks.slack.com/services/T0/B0/xyz")
        );
    }

    #[test]
    fn test_format_message() {
        let notifier = SlackNotifier::new(None, NotifierOptions::default());
        let payload = notifier.format_message(&sample_alert());

        assert_eq!(payload.text, "CRITICAL: Agent Failure");
        assert_eq!(payload.channel, None);
        let attachment = &payload.attachments[0];
        assert_eq!(attachment.color, "#E74C3C");

        let titles: Vec<&str> = attachment.fields.iter().map(|f| f.title).collect();
        assert_eq!(titles, vec!["Agent", "Severity", "Message", "Time"]);
        assert_eq!(attachment.fields[0].value, "Email Processor");
        assert_eq!(attachment.fields[3].value, "2023-11-14T22:13:20.000Z");
        assert!(attachment.fields[1].short);
        assert!(!attachment.fields[2].short);
    }

    #[test]
    fn test_colors() {
        assert_eq!(severity_color(Severity::Warning), "#F39C12");
        assert_eq!(severity_color(Severity::Info), "#3498DB");
    }

    #[tokio::test]
    async fn test_posts_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/hook"))
            .and(body_partial_json(serde_json::json!({
                "text": "CRITICAL: Agent Failure",
                "channel": "#alerts"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(Some(format!("{}/services/hook", server.uri())), fast_retry())
            .with_channel("#alerts");

        notifier.send(&sample_alert()).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(Some(server.uri()), fast_retry());
        let err = notifier.send(&sample_alert()).await.unwrap_err();

        assert!(err.to_string().starts_with("Slack send failed after 3 attempts"));
    }
}
