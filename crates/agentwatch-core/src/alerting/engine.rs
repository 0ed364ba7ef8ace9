//! Rule engine: evaluates snapshots against the rule set and records alerts

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::AlertingConfig;
use crate::error::Result;
use crate::models::{
    Alert, AlertQuery, AlertRule, AlertRulePatch, AlertStatistics, MetricsSnapshot, RuleSet,
    RuleSetPatch, Severity,
};

use super::condition::{self, EvalContext};
use super::dedup::DedupWindow;
use super::dispatcher::NotificationDispatcher;
use super::history::AlertHistory;
use super::notifier::{NotificationResult, Notifier};
use super::rules::RuleStore;

/// Owns the rule store, alert history, dedup window and notifier registry.
///
/// Evaluations hold the history lock for the whole cycle, so concurrent
/// evaluations are serialized and deduplication stays consistent.
pub struct AlertManager {
    rules: RwLock<RuleStore>,
    history: Mutex<AlertHistory>,
    dedup: DedupWindow,
    dispatcher: RwLock<NotificationDispatcher>,
}

impl AlertManager {
    /// Create the base directory if needed and load rules and history from it
    pub async fn new(config: &AlertingConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.base_dir).await?;

        let rules = RuleStore::load(config.rules_path()).await;
        let history = AlertHistory::load(config.history_path(), config.history_limit).await;

        info!(
            base_dir = %config.base_dir.display(),
            rules = rules.rule_set().rules.len(),
            history = history.len(),
            "Alert manager initialized"
        );

        Ok(Self::from_parts(rules, history, DedupWindow::new(config.dedup_window)))
    }

    /// Assemble a manager from already-loaded parts
    pub fn from_parts(rules: RuleStore, history: AlertHistory, dedup: DedupWindow) -> Self {
        Self {
            rules: RwLock::new(rules),
            history: Mutex::new(history),
            dedup,
            dispatcher: RwLock::new(NotificationDispatcher::new()),
        }
    }

    /// Register a notifier under a channel name used in `notifyOn`
    pub async fn register_notifier(&self, channel: impl Into<String>, notifier: Arc<dyn Notifier>) {
        self.dispatcher.write().await.register(channel, notifier);
    }

    /// Evaluate a snapshot at the current time
    pub async fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        self.evaluate_at(snapshot, Utc::now().timestamp_millis()).await
    }

    /// Evaluate a snapshot against every enabled rule as of `now_ms`.
    ///
    /// Returns the fired alerts in rule order; each is also recorded in the
    /// history. Rules whose condition cannot be evaluated never fire.
    pub async fn evaluate_at(&self, snapshot: &MetricsSnapshot, now_ms: i64) -> Vec<Alert> {
        let rules = self.rules.read().await;
        let rule_set = rules.rule_set();

        if !rule_set.enabled {
            debug!(agent_id = %snapshot.agent_id, "Alerting disabled, skipping evaluation");
            return Vec::new();
        }

        let mut history = self.history.lock().await;
        let ctx = EvalContext::from(snapshot);
        let mut fired = Vec::new();

        for rule in rule_set.rules.iter().filter(|r| r.enabled) {
            if self
                .dedup
                .is_duplicate(&history, &rule.id, &snapshot.agent_id, now_ms)
            {
                debug!(rule_id = %rule.id, agent_id = %snapshot.agent_id, "Alert suppressed by dedup window");
                continue;
            }

            if !condition::evaluate(&rule.condition, &ctx) {
                continue;
            }

            let alert = Alert {
                id: rule.id.clone(),
                name: rule.name.clone(),
                severity: rule.severity,
                agent_id: snapshot.agent_id.clone(),
                agent_name: snapshot.agent_name.clone(),
                timestamp: now_ms,
                message: render_message(rule, snapshot),
                metrics: snapshot.clone(),
            };

            warn!(
                rule_id = %rule.id,
                agent_id = %snapshot.agent_id,
                severity = %rule.severity,
                message = %alert.message,
                "Alert triggered"
            );

            history.record(alert.clone()).await;
            fired.push(alert);
        }

        fired
    }

    /// Deliver alerts through the channels their rules name
    pub async fn send_alerts(&self, alerts: &[Alert]) -> Vec<NotificationResult> {
        if alerts.is_empty() {
            return Vec::new();
        }

        let rules = self.rules.read().await.rule_set().clone();
        self.dispatcher.read().await.dispatch(alerts, &rules).await
    }

    /// Evaluate a snapshot and notify on whatever fired
    pub async fn process(&self, snapshot: &MetricsSnapshot) -> (Vec<Alert>, Vec<NotificationResult>) {
        let alerts = self.evaluate(snapshot).await;
        let results = self.send_alerts(&alerts).await;
        (alerts, results)
    }

    /// Alerts matching `query`, newest first
    pub async fn history(&self, query: &AlertQuery) -> Vec<Alert> {
        self.history.lock().await.query(query)
    }

    /// Drop every recorded alert and persist the empty history
    pub async fn clear_history(&self) {
        self.history.lock().await.clear().await;
        info!("Alert history cleared");
    }

    /// Statistics as of now
    pub async fn statistics(&self) -> AlertStatistics {
        self.statistics_at(Utc::now().timestamp_millis()).await
    }

    /// Statistics as of `now_ms`; `by_rule` lists every rule in the rule set
    pub async fn statistics_at(&self, now_ms: i64) -> AlertStatistics {
        let rules = self.rules.read().await;
        let history = self.history.lock().await;
        history.statistics(rules.rule_set().rules.iter().map(|r| r.id.as_str()), now_ms)
    }

    /// A copy of the current rule set
    pub async fn rules(&self) -> RuleSet {
        self.rules.read().await.rule_set().clone()
    }

    /// Shallow-merge a patch into the rule set and persist it
    pub async fn update_rules(&self, patch: RuleSetPatch) {
        self.rules.write().await.update_all(patch).await;
        info!("Alert rules updated");
    }

    /// Patch a single rule; returns `false` when no rule has `rule_id`
    pub async fn update_rule(&self, rule_id: &str, patch: AlertRulePatch) -> bool {
        let updated = self.rules.write().await.update_one(rule_id, patch).await;
        if updated {
            info!(rule_id = %rule_id, "Alert rule updated");
        }
        updated
    }

    /// Change the dedup window; zero disables suppression
    pub fn set_dedup_window(&self, window: Duration) {
        self.dedup.set_window(window);
        info!(window = %humantime::format_duration(window), "Dedup window changed");
    }

    /// Current dedup window
    pub fn dedup_window(&self) -> Duration {
        self.dedup.window()
    }
}

/// Render the alert message for a rule that fired on `snapshot`
pub fn render_message(rule: &AlertRule, snapshot: &MetricsSnapshot) -> String {
    let mut message = format!("[{}] {}", rule.severity.label(), rule.name);

    if rule.severity == Severity::Critical {
        message.push_str(&format!(" - Agent \"{}\" has failed", snapshot.agent_name));
        return message;
    }

    match rule.id.as_str() {
        "low-success-rate" => message.push_str(&format!(
            " - Success rate is {:.2}% (threshold: 80%)",
            snapshot.success_rate * 100.0
        )),
        "slow-execution" => message.push_str(&format!(
            " - Execution took {:.2}s (threshold: 30s)",
            snapshot.execution_time / 1000.0
        )),
        "high-token-usage" => message.push_str(&format!(
            " - Used {} tokens (threshold: 50000)",
            snapshot.total_tokens
        )),
        _ => {}
    }

    message
}
