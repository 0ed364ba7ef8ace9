//! Routes fired alerts to the channels their rules name

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::models::{Alert, RuleSet};

use super::notifier::{NotificationResult, Notifier};

/// Registry of notifiers keyed by channel name
#[derive(Default)]
pub struct NotificationDispatcher {
    notifiers: HashMap<String, Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notifier, replacing any previous one for `channel`
    pub fn register(&mut self, channel: impl Into<String>, notifier: Arc<dyn Notifier>) {
        let channel = channel.into();
        debug!(channel = %channel, notifier = notifier.name(), "Registered notifier");
        self.notifiers.insert(channel, notifier);
    }

    /// Remove and return the notifier for `channel`
    pub fn unregister(&mut self, channel: &str) -> Option<Arc<dyn Notifier>> {
        self.notifiers.remove(channel)
    }

    /// Notifier registered for `channel`
    pub fn get(&self, channel: &str) -> Option<&Arc<dyn Notifier>> {
        self.notifiers.get(channel)
    }

    /// Registered channel names, sorted
    pub fn channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.notifiers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Send every alert to each channel listed in its rule's `notify_on`.
    ///
    /// A channel is used only when it is registered and enabled in the
    /// rule set. Alerts whose rule no longer exists are skipped. Deliveries
    /// run concurrently; a failure on one channel never affects another.
    pub async fn dispatch(&self, alerts: &[Alert], rules: &RuleSet) -> Vec<NotificationResult> {
        let mut deliveries = Vec::new();

        for alert in alerts {
            let Some(rule) = rules.rule(&alert.id) else {
                debug!(rule_id = %alert.id, "Rule no longer exists, not notifying");
                continue;
            };

            for channel in &rule.notify_on {
                let Some(notifier) = self.notifiers.get(channel) else {
                    debug!(channel = %channel, rule_id = %rule.id, "No notifier registered for channel");
                    continue;
                };

                if !rules.channel_enabled(channel) {
                    debug!(channel = %channel, rule_id = %rule.id, "Channel disabled, skipping");
                    continue;
                }

                deliveries.push(deliver(channel.clone(), Arc::clone(notifier), alert));
            }
        }

        join_all(deliveries).await
    }
}

async fn deliver(channel: String, notifier: Arc<dyn Notifier>, alert: &Alert) -> NotificationResult {
    let outcome = notifier.send(alert).await;

    match &outcome {
        Ok(()) => info!(
            channel = %channel,
            rule_id = %alert.id,
            agent_id = %alert.agent_id,
            "Notification sent"
        ),
        Err(e) => error!(
            channel = %channel,
            rule_id = %alert.id,
            agent_id = %alert.agent_id,
            error = %e,
            "Failed to send notification"
        ),
    }

    NotificationResult {
        channel,
        alert_id: alert.id.clone(),
        agent_id: alert.agent_id.clone(),
        success: outcome.is_ok(),
        error: outcome.err().map(|e| e.to_string()),
        sent_at: Utc::now(),
    }
}
