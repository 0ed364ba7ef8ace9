use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::{http_client, iso_timestamp, send_request, NotificationError, Notifier, NotifierOptions};
use crate::models::Alert;

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Issue payload for `POST /repos/{owner}/{repo}/issues`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GitHubIssue {
    /// Issue title
    pub title: String,
    /// Markdown body
    pub body: String,
    /// Labels applied to the issue
    pub labels: Vec<String>,
}

/// Opens a GitHub issue for each alert
pub struct GitHubNotifier {
    repo: Option<String>,
    token: Option<String>,
    api_base: String,
    auto_create: bool,
    label_prefix: String,
    options: NotifierOptions,
    client: Client,
}

impl GitHubNotifier {
    /// `repo` is `owner/repo`
    pub fn new(repo: Option<String>, options: NotifierOptions) -> Self {
        Self {
            repo,
            token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            auto_create: true,
            label_prefix: "alert".to_string(),
            options,
            client: http_client(Duration::from_secs(30)),
        }
    }

    /// API token sent as a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Point at a GitHub Enterprise or test API
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// See [`GitHubNotifier::set_auto_create`]
    pub fn with_auto_create(mut self, enabled: bool) -> Self {
        self.auto_create = enabled;
        self
    }

    /// Prefix of the severity label, `alert` by default
    pub fn with_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.label_prefix = prefix.into();
        self
    }

    /// HTTP request timeout, 30 s by default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Target repository as `owner/name`
    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    /// Replace the target repository; must be `owner/name`
    pub fn set_repository(&mut self, repo: &str) -> Result<(), NotificationError> {
        check_repo_format(repo)?;
        self.repo = Some(repo.to_string());
        Ok(())
    }

    /// When off, `send` succeeds without creating an issue
    pub fn set_auto_create(&mut self, enabled: bool) {
        self.auto_create = enabled;
    }

    /// Issue payload for `alert`
    pub fn format_issue(&self, alert: &Alert) -> GitHubIssue {
        let severity = alert.severity.label();
        let metrics = serde_json::to_string_pretty(&alert.metrics).unwrap_or_default();

        let body = format!(
            "## Alert Details\n\n\
             **Severity:** {severity}\n\
             **Agent:** {} ({})\n\
             **Time:** {}\n\n\
             ## Message\n\n\
             {}\n\n\
             ## Metrics\n\n\
             ```json\n{metrics}\n```\n\n\
             ---\n\
             _Auto-created by AgentWatch_",
            alert.agent_name,
            alert.agent_id,
            iso_timestamp(alert.timestamp),
            alert.message,
        );

        GitHubIssue {
            title: format!("[{severity}] {} - {}", alert.name, alert.agent_name),
            body,
            labels: vec![
                format!("{}:{}", self.label_prefix, alert.severity),
                "alert".to_string(),
                "agents-monitor".to_string(),
            ],
        }
    }
}

fn check_repo_format(repo: &str) -> Result<(), NotificationError> {
    if repo.contains('/') {
        Ok(())
    } else {
        Err(NotificationError::Config("Invalid repo format. Use: owner/repo".into()))
    }
}

#[async_trait]
impl Notifier for GitHubNotifier {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn options(&self) -> &NotifierOptions {
        &self.options
    }

    fn validate(&self) -> Result<(), NotificationError> {
        self.options.ensure_enabled()?;
        match self.repo.as_deref() {
            Some(repo) if !repo.is_empty() => check_repo_format(repo),
            _ => Err(NotificationError::Config(
                "GitHub notifier: repo not configured (format: owner/repo)".into(),
            )),
        }
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotificationError> {
        if !self.auto_create {
            info!(alert_id = %alert.id, "GitHub issue creation disabled");
            return Ok(());
        }

        let repo = self.repo.as_deref().ok_or_else(|| {
            NotificationError::Config("GitHub notifier: repo not configured (format: owner/repo)".into())
        })?;

        let url = format!("{}/repos/{}/issues", self.api_base, repo);
        let mut request = self
            .client
            .post(&url)
            .header("Accept", "application/vnd.github+json")
            .json(&self.format_issue(alert));

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        send_request(request, "GitHub").await?;

        debug!(alert_id = %alert.id, repo = %repo, "Created GitHub issue");
        Ok(())
    }
}
