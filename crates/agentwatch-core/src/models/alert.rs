//! Alert data models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::metrics::MetricsSnapshot;

/// Alert severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Warning
    #[default]
    Warning,
    /// Critical
    Critical,
}

impl Severity {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Uppercase label used in rendered messages
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

fn default_true() -> bool {
    true
}

/// An alert rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    /// Unique identifier within the rule set
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Alert severity
    #[serde(default)]
    pub severity: Severity,

    /// Boolean expression over metric fields, e.g. `successRate < 0.8`
    pub condition: String,

    /// Informational threshold; `condition` is authoritative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    /// Whether the rule is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Channel names to notify, in order
    #[serde(default)]
    pub notify_on: Vec<String>,
}

impl AlertRule {
    /// Create an enabled rule with no threshold and no channels
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            condition: condition.into(),
            threshold: None,
            enabled: true,
            notify_on: Vec::new(),
        }
    }

    /// Set the informational threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Set the channels to notify
    pub fn notify_on<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notify_on = channels.into_iter().map(Into::into).collect();
        self
    }
}

/// Partial update for a single rule. Supplied fields replace the current ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertRulePatch {
    /// New display name
    pub name: Option<String>,
    /// New severity
    pub severity: Option<Severity>,
    /// New condition text
    pub condition: Option<String>,
    /// New threshold
    pub threshold: Option<f64>,
    /// Enable or disable the rule
    pub enabled: Option<bool>,
    /// New channel list
    pub notify_on: Option<Vec<String>>,
}

impl AlertRulePatch {
    /// Patch that only toggles `enabled`
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Shallow-merge the supplied fields into `rule`
    pub fn apply(self, rule: &mut AlertRule) {
        if let Some(name) = self.name {
            rule.name = name;
        }
        if let Some(severity) = self.severity {
            rule.severity = severity;
        }
        if let Some(condition) = self.condition {
            rule.condition = condition;
        }
        if let Some(threshold) = self.threshold {
            rule.threshold = Some(threshold);
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
        if let Some(notify_on) = self.notify_on {
            rule.notify_on = notify_on;
        }
    }
}

/// Configuration of one notification channel.
///
/// Only `enabled` is interpreted by the core; provider-specific keys
/// (`webhookUrl`, `recipients`, ...) are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Whether alerts may be delivered through this channel
    #[serde(default)]
    pub enabled: bool,

    /// Provider-specific settings
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl ChannelConfig {
    /// Build a channel config from a JSON object of settings
    pub fn new(enabled: bool, settings: serde_json::Value) -> Self {
        let settings = match settings {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self { enabled, settings }
    }
}

/// The complete, persisted alerting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Global kill switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Known severities, informational
    #[serde(default)]
    pub severity_levels: Vec<Severity>,

    /// Rules in evaluation order
    #[serde(default)]
    pub rules: Vec<AlertRule>,

    /// Channel name -> channel configuration
    #[serde(default)]
    pub notification_channels: BTreeMap<String, ChannelConfig>,
}

impl RuleSet {
    /// Find a rule by id
    pub fn rule(&self, id: &str) -> Option<&AlertRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Whether the named channel exists and is enabled
    pub fn channel_enabled(&self, name: &str) -> bool {
        self.notification_channels
            .get(name)
            .is_some_and(|c| c.enabled)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        let rules = vec![
            AlertRule::new(
                "agent-failure",
                "Agent Failure",
                Severity::Critical,
                r#"status === "failed""#,
            )
            .notify_on(["email", "slack", "github"]),
            AlertRule::new(
                "low-success-rate",
                "Low Success Rate",
                Severity::Warning,
                "successRate < 0.8",
            )
            .with_threshold(0.8)
            .notify_on(["email", "slack"]),
            AlertRule::new(
                "slow-execution",
                "Slow Execution",
                Severity::Warning,
                "executionTime > 30000",
            )
            .with_threshold(30000.0)
            .notify_on(["slack"]),
            AlertRule::new(
                "high-token-usage",
                "High Token Usage",
                Severity::Info,
                "totalTokens > 50000",
            )
            .with_threshold(50000.0)
            .notify_on(["email"]),
        ];

        let mut notification_channels = BTreeMap::new();
        notification_channels.insert(
            "email".to_string(),
            ChannelConfig::new(
                false,
                serde_json::json!({ "provider": "smtp", "recipients": [] }),
            ),
        );
        notification_channels.insert(
            "slack".to_string(),
            ChannelConfig::new(false, serde_json::json!({ "webhookUrl": null })),
        );
        notification_channels.insert(
            "github".to_string(),
            ChannelConfig::new(false, serde_json::json!({ "autoCreateIssues": false })),
        );

        Self {
            enabled: true,
            severity_levels: vec![Severity::Critical, Severity::Warning, Severity::Info],
            rules,
            notification_channels,
        }
    }
}

/// Partial update for the whole rule set. Supplied top-level fields
/// replace the current ones wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleSetPatch {
    /// Global kill switch
    pub enabled: Option<bool>,
    /// Replacement severity list
    pub severity_levels: Option<Vec<Severity>>,
    /// Replacement rule list
    pub rules: Option<Vec<AlertRule>>,
    /// Replacement channel map
    pub notification_channels: Option<BTreeMap<String, ChannelConfig>>,
}

impl RuleSetPatch {
    /// Shallow-merge the supplied fields into `set`
    pub fn apply(self, set: &mut RuleSet) {
        if let Some(enabled) = self.enabled {
            set.enabled = enabled;
        }
        if let Some(levels) = self.severity_levels {
            set.severity_levels = levels;
        }
        if let Some(rules) = self.rules {
            set.rules = rules;
        }
        if let Some(channels) = self.notification_channels {
            set.notification_channels = channels;
        }
    }
}

/// A fired alert. `id` is the id of the rule that fired, so it repeats
/// across alerts; deduplication keys on `(id, agent_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Id of the triggering rule
    pub id: String,

    /// Name of the triggering rule
    pub name: String,

    /// Severity of the triggering rule
    pub severity: Severity,

    /// Agent the alert is about
    pub agent_id: String,

    /// Display name of the agent
    pub agent_name: String,

    /// When the alert fired, epoch milliseconds
    pub timestamp: i64,

    /// Rendered message
    pub message: String,

    /// Snapshot that triggered the alert
    pub metrics: MetricsSnapshot,
}

/// Filters for history queries. All supplied filters must match.
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    /// Only alerts about this agent
    pub agent_id: Option<String>,
    /// Only alerts with this severity
    pub severity: Option<Severity>,
    /// Only alerts fired by this rule
    pub rule_id: Option<String>,
    /// Only alerts strictly newer than this epoch-millisecond timestamp
    pub since: Option<i64>,
}

impl AlertQuery {
    /// Query matching everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Only alerts about `agent_id`
    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Only alerts with `severity`
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Only alerts fired by `rule_id`
    pub fn rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Only alerts strictly newer than `timestamp_ms`
    pub fn since(mut self, timestamp_ms: i64) -> Self {
        self.since = Some(timestamp_ms);
        self
    }

    /// Check an alert against every supplied filter
    pub fn matches(&self, alert: &Alert) -> bool {
        self.agent_id.as_ref().map_or(true, |a| &alert.agent_id == a)
            && self.severity.map_or(true, |s| alert.severity == s)
            && self.rule_id.as_ref().map_or(true, |r| &alert.id == r)
            && self.since.map_or(true, |t| alert.timestamp > t)
    }
}

/// Alert counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Critical alerts
    pub critical: usize,
    /// Warning alerts
    pub warning: usize,
    /// Info alerts
    pub info: usize,
}

impl SeverityCounts {
    /// Increment the counter for `severity`
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Summary of the alert history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatistics {
    /// Size of the retained history
    pub total_alerts: usize,
    /// Alerts fired in the last 24 hours
    pub alerts_last_24h: usize,
    /// Last-24h alerts per severity
    pub by_severity: SeverityCounts,
    /// Last-24h alerts per rule id
    pub by_rule: BTreeMap<String, usize>,
}
