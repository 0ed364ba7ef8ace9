//! Alert history: a bounded, persisted log of fired alerts

use std::cmp::Reverse;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::models::{Alert, AlertQuery, AlertStatistics};

use super::persist;

/// Number of alerts retained by default
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Oldest-first log of fired alerts, written through to `alert-history.json`.
///
/// Appending past the limit evicts the oldest entries.
#[derive(Debug)]
pub struct AlertHistory {
    path: PathBuf,
    alerts: VecDeque<Alert>,
    limit: usize,
}

impl AlertHistory {
    /// Load the history from `path`. Missing or unreadable files give an
    /// empty history; oversized files keep only the newest `limit` entries.
    ///
    /// Entries that no longer deserialize are skipped. Whenever anything
    /// is skipped the file is first copied to `<path>.bak`, since the next
    /// write replaces it.
    pub async fn load(path: impl Into<PathBuf>, limit: usize) -> Self {
        let path = path.into();
        let limit = limit.max(1);

        let alerts = match persist::read_json::<Vec<serde_json::Value>>(&path).await {
            Ok(Some(entries)) => {
                let total = entries.len();
                let alerts: VecDeque<Alert> = entries
                    .into_iter()
                    .filter_map(|entry| match serde_json::from_value(entry) {
                        Ok(alert) => Some(alert),
                        Err(e) => {
                            warn!(error = %e, "Skipping unreadable alert history entry");
                            None
                        }
                    })
                    .collect();
                if alerts.len() < total {
                    backup(&path).await;
                }
                alerts
            }
            Ok(None) => VecDeque::new(),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error loading alert history");
                backup(&path).await;
                VecDeque::new()
            }
        };

        let mut history = Self {
            path,
            alerts,
            limit,
        };

        let overflow = history.alerts.len().saturating_sub(limit);
        if overflow > 0 {
            warn!(dropped = overflow, limit, "Alert history over limit, dropping oldest entries");
            history.alerts.drain(..overflow);
        }

        debug!(count = history.alerts.len(), "Loaded alert history");
        history
    }

    /// Location of the history file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum number of retained alerts
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of retained alerts
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// True when no alert is retained
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Alerts oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Alert> {
        self.alerts.iter()
    }

    /// Append an alert, evicting the oldest entries past the limit, then persist
    pub async fn record(&mut self, alert: Alert) {
        self.alerts.push_back(alert);
        while self.alerts.len() > self.limit {
            self.alerts.pop_front();
        }
        self.save().await;
    }

    /// Alerts matching every filter in `query`, newest first
    pub fn query(&self, query: &AlertQuery) -> Vec<Alert> {
        let mut matched: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();

        matched.sort_by_key(|a| Reverse(a.timestamp));
        matched
    }

    /// Drop every alert, then persist
    pub async fn clear(&mut self) {
        self.alerts.clear();
        self.save().await;
    }

    /// Summarise the history as of `now_ms`. Every id in `rule_ids` appears
    /// in `by_rule`, with zero when it has not fired in the last 24 hours.
    pub fn statistics<'a>(
        &self,
        rule_ids: impl IntoIterator<Item = &'a str>,
        now_ms: i64,
    ) -> AlertStatistics {
        let cutoff = now_ms - DAY_MS;
        let recent: Vec<&Alert> = self.alerts.iter().filter(|a| a.timestamp > cutoff).collect();

        let mut stats = AlertStatistics {
            total_alerts: self.alerts.len(),
            alerts_last_24h: recent.len(),
            ..AlertStatistics::default()
        };

        for alert in &recent {
            stats.by_severity.add(alert.severity);
        }

        for rule_id in rule_ids {
            let count = recent.iter().filter(|a| a.id == rule_id).count();
            stats.by_rule.insert(rule_id.to_string(), count);
        }

        stats
    }

    async fn save(&self) {
        if let Err(e) = persist::write_json(&self.path, &self.alerts).await {
            error!(path = %self.path.display(), error = %e, "Error saving alert history");
        }
    }
}

async fn backup(path: &Path) {
    match persist::backup(path).await {
        Ok(copy) => warn!(backup = %copy.display(), "Saved a copy of the alert history file"),
        Err(e) => error!(path = %path.display(), error = %e, "Error backing up alert history"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{AgentStatus, MetricsSnapshot, Severity};
    use pretty_assertions::assert_eq;

    pub(crate) fn alert(rule_id: &str, agent_id: &str, severity: Severity, timestamp: i64) -> Alert {
        Alert {
            id: rule_id.to_string(),
            name: rule_id.to_string(),
            severity,
            agent_id: agent_id.to_string(),
            agent_name: format!("{agent_id} name"),
            timestamp,
            message: format!("{rule_id} fired"),
            metrics: MetricsSnapshot::new(agent_id, "Agent", AgentStatus::Running, 1.0, 10.0, 10),
        }
    }

    async fn history_in(dir: &tempfile::TempDir) -> AlertHistory {
        AlertHistory::load(dir.path().join("alert-history.json"), DEFAULT_HISTORY_LIMIT).await
    }

    #[tokio::test]
    async fn test_record_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = history_in(&dir).await;

        history.record(alert("r1", "a1", Severity::Info, 10)).await;
        history.record(alert("r2", "a1", Severity::Info, 20)).await;

        let reloaded = history_in(&dir).await;
        let ids: Vec<&str> = reloaded.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_limit_evicts_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert-history.json");
        let full: Vec<Alert> = (0..1000)
            .map(|i| alert("r", "a", Severity::Info, i))
            .collect();
        tokio::fs::write(&path, serde_json::to_vec(&full).unwrap()).await.unwrap();

        let mut history = AlertHistory::load(&path, DEFAULT_HISTORY_LIMIT).await;
        assert_eq!(history.len(), 1000);

        for ts in 1000..1003 {
            history.record(alert("r", "a", Severity::Info, ts)).await;
        }

        assert_eq!(history.len(), 1000);
        assert_eq!(history.iter().next().unwrap().timestamp, 3);
        assert_eq!(history.iter().last().unwrap().timestamp, 1002);

        let reloaded = AlertHistory::load(&path, DEFAULT_HISTORY_LIMIT).await;
        assert_eq!(reloaded.len(), 1000);
        assert_eq!(reloaded.iter().next().unwrap().timestamp, 3);
    }

    #[tokio::test]
    async fn test_small_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = AlertHistory::load(dir.path().join("h.json"), 2).await;

        for ts in 1..=5 {
            history.record(alert("r", "a", Severity::Info, ts)).await;
        }

        let kept: Vec<i64> = history.iter().map(|a| a.timestamp).collect();
        assert_eq!(kept, vec![4, 5]);
    }

    #[tokio::test]
    async fn test_oversized_file_is_truncated_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert-history.json");
        let big: Vec<Alert> = (0..1200).map(|i| alert("r", "a", Severity::Info, i)).collect();
        tokio::fs::write(&path, serde_json::to_vec(&big).unwrap()).await.unwrap();

        let history = AlertHistory::load(&path, DEFAULT_HISTORY_LIMIT).await;

        assert_eq!(history.len(), 1000);
        assert_eq!(history.iter().next().unwrap().timestamp, 200);
    }

    #[tokio::test]
    async fn test_corrupt_file_gives_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert-history.json");
        tokio::fs::write(&path, b"[{]").await.unwrap();

        assert!(AlertHistory::load(&path, DEFAULT_HISTORY_LIMIT).await.is_empty());
        assert_eq!(
            tokio::fs::read(dir.path().join("alert-history.json.bak")).await.unwrap(),
            b"[{]"
        );
    }

    #[tokio::test]
    async fn test_invalid_entries_are_skipped_and_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert-history.json");

        let mut entries = vec![
            serde_json::to_value(alert("r1", "a1", Severity::Info, 1)).unwrap(),
            serde_json::to_value(alert("r2", "a1", Severity::Info, 2)).unwrap(),
            serde_json::to_value(alert("r3", "a1", Severity::Info, 3)).unwrap(),
        ];
        entries[1]["metrics"]
            .as_object_mut()
            .unwrap()
            .remove("totalTokens");
        let raw = serde_json::to_vec(&entries).unwrap();
        tokio::fs::write(&path, &raw).await.unwrap();

        let mut history = AlertHistory::load(&path, DEFAULT_HISTORY_LIMIT).await;
        let ids: Vec<&str> = history.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);

        history.record(alert("r4", "a1", Severity::Info, 4)).await;

        let reloaded = history_in(&dir).await;
        let ids: Vec<&str> = reloaded.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3", "r4"]);
        assert_eq!(
            tokio::fs::read(dir.path().join("alert-history.json.bak")).await.unwrap(),
            raw
        );
    }

    #[tokio::test]
    async fn test_clean_load_writes_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = history_in(&dir).await;
        history.record(alert("r1", "a1", Severity::Info, 1)).await;

        assert_eq!(history_in(&dir).await.len(), 1);
        assert!(!dir.path().join("alert-history.json.bak").exists());
    }

    #[tokio::test]
    async fn test_query_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = history_in(&dir).await;
        history.record(alert("r1", "a1", Severity::Warning, 100)).await;
        history.record(alert("r2", "a1", Severity::Critical, 300)).await;
        history.record(alert("r1", "a2", Severity::Warning, 200)).await;
        history.record(alert("r3", "a1", Severity::Warning, 400)).await;

        let all: Vec<i64> = history.query(&AlertQuery::all()).iter().map(|a| a.timestamp).collect();
        assert_eq!(all, vec![400, 300, 200, 100]);

        let both = history.query(&AlertQuery::all().severity(Severity::Warning).agent("a1"));
        let both: Vec<(&str, i64)> = both.iter().map(|a| (a.id.as_str(), a.timestamp)).collect();
        assert_eq!(both, vec![("r3", 400), ("r1", 100)]);

        let by_rule = history.query(&AlertQuery::all().rule("r1"));
        assert_eq!(by_rule.len(), 2);

        let since: Vec<i64> = history
            .query(&AlertQuery::all().since(200))
            .iter()
            .map(|a| a.timestamp)
            .collect();
        assert_eq!(since, vec![400, 300]);
    }

    #[tokio::test]
    async fn test_query_returns_copies() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = history_in(&dir).await;
        history.record(alert("r1", "a1", Severity::Info, 1)).await;

        let mut copy = history.query(&AlertQuery::all());
        copy[0].message = "tampered".into();
        copy.clear();

        assert_eq!(history.len(), 1);
        assert_eq!(history.iter().next().unwrap().message, "r1 fired");
    }

    #[tokio::test]
    async fn test_clear_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = history_in(&dir).await;
        history.record(alert("r1", "a1", Severity::Info, 1)).await;

        history.clear().await;

        assert!(history.is_empty());
        assert!(history_in(&dir).await.is_empty());
    }

    #[tokio::test]
    async fn test_statistics_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = history_in(&dir).await;
        let now = 10 * DAY_MS;

        history.record(alert("old", "a1", Severity::Critical, now - DAY_MS - 1)).await;
        history.record(alert("edge", "a1", Severity::Critical, now - DAY_MS)).await;
        history.record(alert("r1", "a1", Severity::Critical, now - 1000)).await;
        history.record(alert("r1", "a2", Severity::Warning, now - 500)).await;
        history.record(alert("r2", "a1", Severity::Info, now)).await;

        let stats = history.statistics(["r1", "r2", "r3", "old"], now);

        assert_eq!(stats.total_alerts, 5);
        assert_eq!(stats.alerts_last_24h, 3);
        assert_eq!(stats.by_severity.critical, 1);
        assert_eq!(stats.by_severity.warning, 1);
        assert_eq!(stats.by_severity.info, 1);
        assert_eq!(stats.by_rule["r1"], 2);
        assert_eq!(stats.by_rule["r2"], 1);
        assert_eq!(stats.by_rule["r3"], 0);
        assert_eq!(stats.by_rule["old"], 0);
        assert!(!stats.by_rule.contains_key("edge"));
    }
}
