//! Configuration management for AgentWatch

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerting::notifier::{NotifierOptions, SmtpSettings};
use crate::alerting::{DEFAULT_DEDUP_WINDOW, DEFAULT_HISTORY_LIMIT};
use crate::error::Result;

/// Environment variable prefix, e.g. `AGENTWATCH__ALERTING__BASE_DIR`
pub const ENV_PREFIX: &str = "AGENTWATCH";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule engine and storage configuration
    pub alerting: AlertingConfig,

    /// Notification channel configuration
    pub notifiers: NotifiersConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional TOML file, then `AGENTWATCH__*`
    /// environment variables. Anything unset keeps its default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        let config = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

/// Alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Directory holding the rules and history files
    pub base_dir: PathBuf,
    /// Rules file; relative paths resolve against `base_dir`
    pub rules_file: PathBuf,
    /// History file; relative paths resolve against `base_dir`
    pub history_file: PathBuf,
    /// Suppression window per (rule, agent)
    #[serde(with = "humantime_serde")]
    pub dedup_window: Duration,
    /// Maximum number of alerts kept in history
    pub history_limit: usize,
}

impl AlertingConfig {
    /// Full path to the rules file
    pub fn rules_path(&self) -> PathBuf {
        self.base_dir.join(&self.rules_file)
    }

    /// Full path to the history file
    pub fn history_path(&self) -> PathBuf {
        self.base_dir.join(&self.history_file)
    }

    /// Configuration rooted at `base_dir` with default file names
    pub fn in_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/tmp/agent-alerts"),
            rules_file: PathBuf::from("alert-rules.json"),
            history_file: PathBuf::from("alert-history.json"),
            dedup_window: DEFAULT_DEDUP_WINDOW,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Notification channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifiersConfig {
    /// Total delivery attempts per alert and channel
    pub retry_attempts: u32,
    /// Base retry delay, doubled after each failure
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Per-request timeout for HTTP channels
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Email channel
    pub email: Option<EmailConfig>,
    /// Slack channel
    pub slack: Option<SlackConfig>,
    /// GitHub issues channel
    pub github: Option<GitHubConfig>,
    /// Generic webhook channel
    pub webhook: Option<WebhookConfig>,
}

impl NotifiersConfig {
    /// Shared notifier options derived from this configuration
    pub fn options(&self) -> NotifierOptions {
        NotifierOptions {
            enabled: true,
            retry_attempts: self.retry_attempts.max(1),
            retry_delay: self.retry_delay,
        }
    }
}

impl Default for NotifiersConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            email: None,
            slack: None,
            github: None,
            webhook: None,
        }
    }
}

/// Email channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Recipient addresses
    #[serde(default)]
    pub recipients: Vec<String>,
    /// SMTP relay; without it emails are only logged
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

/// Slack channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Incoming webhook URL
    pub webhook_url: String,
    /// Channel override
    #[serde(default)]
    pub channel: Option<String>,
}

/// GitHub channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Repository as `owner/repo`
    pub repo: String,
    /// API token
    #[serde(default)]
    pub token: Option<String>,
    /// API base URL
    #[serde(default)]
    pub api_base: Option<String>,
    /// Create issues for alerts
    #[serde(default = "default_true")]
    pub auto_create_issues: bool,
    /// Prefix of the severity label
    #[serde(default)]
    pub label_prefix: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Webhook channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Target URL
    pub url: String,
    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl LoggingConfig {
    /// Whether logs should be emitted as JSON
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
