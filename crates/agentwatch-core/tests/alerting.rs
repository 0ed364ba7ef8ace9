//! End-to-end tests for the alerting pipeline

use std::sync::Arc;
use std::time::Duration;

use agentwatch::alerting::notifier::{GitHubNotifier, SlackNotifier};
use agentwatch::alerting::{AlertManager, NotifierOptions};
use agentwatch::config::AlertingConfig;
use agentwatch::models::{
    AgentStatus, AlertQuery, AlertRulePatch, ChannelConfig, MetricsSnapshot, RuleSetPatch, Severity,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn failed(agent_id: &str) -> MetricsSnapshot {
    MetricsSnapshot::new(agent_id, "Email Processor", AgentStatus::Failed, 1.0, 1000.0, 5000)
}

fn quick_options() -> NotifierOptions {
    NotifierOptions {
        retry_delay: Duration::from_millis(1),
        ..NotifierOptions::default()
    }
}

async fn enable_channels(manager: &AlertManager, names: &[&str]) {
    let mut channels = manager.rules().await.notification_channels;
    for name in names {
        channels
            .entry((*name).to_string())
            .or_insert_with(ChannelConfig::default)
            .enabled = true;
    }
    manager
        .update_rules(RuleSetPatch {
            notification_channels: Some(channels),
            ..RuleSetPatch::default()
        })
        .await;
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = AlertingConfig::in_dir(dir.path().join("state"));

    {
        let manager = AlertManager::new(&config).await.unwrap();
        assert!(manager.update_rule("high-token-usage", AlertRulePatch::enabled(false)).await);
        assert_eq!(manager.evaluate(&failed("a1")).await.len(), 1);
    }

    let manager = AlertManager::new(&config).await.unwrap();
    assert!(!manager.rules().await.rule("high-token-usage").unwrap().enabled);

    let history = manager.history(&AlertQuery::all()).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, "agent-failure");

    // the restored history still deduplicates
    assert!(manager.evaluate(&failed("a1")).await.is_empty());
}

#[tokio::test]
async fn test_process_notifies_enabled_channels() {
    let slack = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&slack)
        .await;

    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&github)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manager = AlertManager::new(&AlertingConfig::in_dir(dir.path())).await.unwrap();
    enable_channels(&manager, &["slack"]).await;

    manager
        .register_notifier(
            "slack",
            Arc::new(SlackNotifier::new(Some(format!("{}/hook", slack.uri())), quick_options())),
        )
        .await;
    // registered but its channel stays disabled
    manager
        .register_notifier(
            "github",
            Arc::new(
                GitHubNotifier::new(Some("acme/agents".into()), quick_options())
                    .with_api_base(github.uri()),
            ),
        )
        .await;

    let (alerts, results) = manager.process(&failed("a1")).await;

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Critical);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].channel, "slack");
    assert!(results[0].success);
}

#[tokio::test]
async fn test_failing_channel_reports_after_retries() {
    let slack = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&slack)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manager = AlertManager::new(&AlertingConfig::in_dir(dir.path())).await.unwrap();
    enable_channels(&manager, &["slack"]).await;
    manager
        .register_notifier("slack", Arc::new(SlackNotifier::new(Some(slack.uri()), quick_options())))
        .await;

    let (alerts, results) = manager.process(&failed("a1")).await;

    assert_eq!(alerts.len(), 1);
    assert!(!results[0].success);
    assert!(results[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("Slack send failed after 3 attempts"));
    // the alert is recorded regardless of delivery
    assert_eq!(manager.history(&AlertQuery::all()).await.len(), 1);
}

#[tokio::test]
async fn test_history_is_capped_per_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = AlertingConfig {
        history_limit: 3,
        dedup_window: Duration::ZERO,
        ..AlertingConfig::in_dir(dir.path())
    };
    let manager = AlertManager::new(&config).await.unwrap();

    for i in 0..5 {
        manager.evaluate_at(&failed("a1"), 1_000 + i).await;
    }

    let kept: Vec<i64> = manager
        .history(&AlertQuery::all())
        .await
        .iter()
        .map(|a| a.timestamp)
        .collect();
    assert_eq!(kept, vec![1_004, 1_003, 1_002]);
}

#[tokio::test]
async fn test_concurrent_evaluations_fire_once() {
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(AlertManager::new(&AlertingConfig::in_dir(dir.path())).await.unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.evaluate(&failed("a1")).await.len() })
        })
        .collect();

    let mut fired = 0;
    for handle in handles {
        fired += handle.await.unwrap();
    }

    assert_eq!(fired, 1);
}
