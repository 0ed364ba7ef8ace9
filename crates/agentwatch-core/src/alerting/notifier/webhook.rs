use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{http_client, send_request, NotificationError, Notifier, NotifierOptions};
use crate::models::Alert;

/// Posts the alert as JSON to an arbitrary URL
pub struct WebhookNotifier {
    url: Option<String>,
    headers: BTreeMap<String, String>,
    options: NotifierOptions,
    client: Client,
}

impl WebhookNotifier {
    /// Notifier posting to `url`; `None` leaves it unconfigured
    pub fn new(url: Option<String>, options: NotifierOptions) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
            options,
            client: http_client(Duration::from_secs(30)),
        }
    }

    /// Extra headers sent with every request
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// HTTP request timeout, 30 s by default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "Webhook"
    }

    fn options(&self) -> &NotifierOptions {
        &self.options
    }

    fn validate(&self) -> Result<(), NotificationError> {
        self.options.ensure_enabled()?;
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| NotificationError::Config("Webhook notifier: url not configured".into()))?;

        url::Url::parse(url)
            .map(|_| ())
            .map_err(|e| NotificationError::Config(format!("Invalid webhook URL: {e}")))
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| NotificationError::Config("Webhook notifier: url not configured".into()))?;

        let mut request = self.client.post(url).json(alert);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        send_request(request, "Webhook").await?;

        debug!(alert_id = %alert.id, url = %url, "Sent webhook notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::notifier::tests::sample_alert;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_invalid_url_fails_validation() {
        let notifier = WebhookNotifier::new(Some("::nope".into()), NotifierOptions::default());
        assert!(matches!(notifier.validate(), Err(NotificationError::Config(_))));

        let missing = WebhookNotifier::new(None, NotifierOptions::default());
        assert!(missing.validate().is_err());
    }

    #[tokio::test]
    async fn test_posts_alert_json_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(header("x-api-key", "k1"))
            .and(body_partial_json(serde_json::json!({
                "id": "agent-failure",
                "agentId": "agent-1",
                "severity": "critical"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let headers = BTreeMap::from([("x-api-key".to_string(), "k1".to_string())]);
        let notifier = WebhookNotifier::new(Some(format!("{}/alerts", server.uri())), NotifierOptions::default())
            .with_headers(headers);

        notifier.send(&sample_alert()).await.unwrap();
    }
}
