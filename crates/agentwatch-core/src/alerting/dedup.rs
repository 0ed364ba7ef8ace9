//! Time-windowed deduplication of alerts per rule and agent

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::history::AlertHistory;

/// Default deduplication window: five minutes
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(300_000);

/// Suppresses a rule from firing again for the same agent while a previous
/// alert is younger than the window. A zero window disables suppression.
#[derive(Debug)]
pub struct DedupWindow {
    window_ms: AtomicU64,
}

impl DedupWindow {
    /// Window of `window`; zero disables suppression
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: AtomicU64::new(duration_ms(window)),
        }
    }

    /// Current window
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.load(Ordering::Relaxed))
    }

    /// Change the window; applies to subsequent checks
    pub fn set_window(&self, window: Duration) {
        self.window_ms.store(duration_ms(window), Ordering::Relaxed);
    }

    /// Whether `history` holds an alert for `(rule_id, agent_id)` fired less
    /// than one window before `now_ms`
    pub fn is_duplicate(
        &self,
        history: &AlertHistory,
        rule_id: &str,
        agent_id: &str,
        now_ms: i64,
    ) -> bool {
        let window = self.window_ms.load(Ordering::Relaxed);
        if window == 0 {
            return false;
        }
        let window = i64::try_from(window).unwrap_or(i64::MAX);

        history.iter().rev().any(|alert| {
            alert.id == rule_id
                && alert.agent_id == agent_id
                && now_ms.saturating_sub(alert.timestamp) < window
        })
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::history::tests::alert;
    use crate::alerting::history::DEFAULT_HISTORY_LIMIT;
    use crate::models::Severity;

    async fn history_with(alerts: Vec<crate::models::Alert>) -> (tempfile::TempDir, AlertHistory) {
        let dir = tempfile::tempdir().unwrap();
        let mut history =
            AlertHistory::load(dir.path().join("alert-history.json"), DEFAULT_HISTORY_LIMIT).await;
        for a in alerts {
            history.record(a).await;
        }
        (dir, history)
    }

    #[tokio::test]
    async fn test_within_window_is_duplicate() {
        let (_dir, history) = history_with(vec![alert("r1", "a1", Severity::Info, 1_000)]).await;
        let dedup = DedupWindow::default();

        assert!(dedup.is_duplicate(&history, "r1", "a1", 1_000));
        assert!(dedup.is_duplicate(&history, "r1", "a1", 300_999));
        assert!(!dedup.is_duplicate(&history, "r1", "a1", 301_000));
    }

    #[tokio::test]
    async fn test_keys_on_rule_and_agent() {
        let (_dir, history) = history_with(vec![alert("r1", "a1", Severity::Info, 1_000)]).await;
        let dedup = DedupWindow::default();

        assert!(!dedup.is_duplicate(&history, "r1", "a2", 2_000));
        assert!(!dedup.is_duplicate(&history, "r2", "a1", 2_000));
    }

    #[tokio::test]
    async fn test_zero_window_disables() {
        let (_dir, history) = history_with(vec![alert("r1", "a1", Severity::Info, 1_000)]).await;
        let dedup = DedupWindow::new(Duration::ZERO);

        assert!(!dedup.is_duplicate(&history, "r1", "a1", 1_000));
    }

    #[tokio::test]
    async fn test_window_is_mutable() {
        let (_dir, history) = history_with(vec![alert("r1", "a1", Severity::Info, 0)]).await;
        let dedup = DedupWindow::default();
        assert!(dedup.is_duplicate(&history, "r1", "a1", 60_000));

        dedup.set_window(Duration::from_secs(30));

        assert_eq!(dedup.window(), Duration::from_secs(30));
        assert!(!dedup.is_duplicate(&history, "r1", "a1", 60_000));
    }
}
