//! AgentWatch CLI
//!
//! Command-line interface for the AgentWatch alerting core.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use agentwatch::alerting::{build_notifiers, AlertManager};
use agentwatch::models::{Alert, AlertQuery, AlertRulePatch, MetricsSnapshot, RuleSetPatch, Severity};
use agentwatch::Config;

/// AgentWatch - Alerting for AI Agents
#[derive(Parser)]
#[command(name = "agentwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "AGENTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage alert rules
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },

    /// Show alert history
    History {
        /// Agent ID filter
        #[arg(long)]
        agent: Option<String>,

        /// Severity filter (info, warning, critical)
        #[arg(long)]
        severity: Option<Severity>,

        /// Rule ID filter
        #[arg(long)]
        rule: Option<String>,

        /// Time range (e.g., "1h", "24h", "7d")
        #[arg(long, value_parser = humantime::parse_duration)]
        last: Option<Duration>,
    },

    /// Show alert statistics
    Stats,

    /// Delete all alert history
    Clear,

    /// Evaluate a metrics snapshot against the rules
    Evaluate {
        /// Snapshot JSON file
        snapshot: PathBuf,

        /// Send notifications for fired alerts
        #[arg(long)]
        notify: bool,
    },
}

#[derive(Subcommand)]
enum RulesCommands {
    /// List all alert rules
    List,

    /// Enable a rule
    Enable {
        /// Rule ID
        rule_id: String,
    },

    /// Disable a rule
    Disable {
        /// Rule ID
        rule_id: String,
    },

    /// Turn all alerting on or off
    ToggleAll {
        /// on or off
        #[arg(value_parser = parse_switch)]
        state: bool,
    },
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s {
        "on" | "true" => Ok(true),
        "off" | "false" => Ok(false),
        other => Err(format!("expected 'on' or 'off', got '{other}'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.is_json() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Execute command
    match run(cli.command, config, cli.format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let manager = AlertManager::new(&config.alerting)
        .await
        .context("failed to initialize alert manager")?;

    match command {
        Commands::Rules { command } => run_rules(&manager, command, format).await,
        Commands::History {
            agent,
            severity,
            rule,
            last,
        } => run_history(&manager, agent, severity, rule, last, format).await,
        Commands::Stats => run_stats(&manager, format).await,
        Commands::Clear => {
            manager.clear_history().await;
            println!("Alert history cleared");
            Ok(())
        }
        Commands::Evaluate { snapshot, notify } => {
            run_evaluate(&manager, &config, &snapshot, notify, format).await
        }
    }
}

async fn run_rules(
    manager: &AlertManager,
    command: RulesCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        RulesCommands::List => {
            let rules = manager.rules().await;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
                return Ok(());
            }

            println!(
                "Alerting: {}",
                if rules.enabled { "enabled" } else { "disabled" }
            );
            for rule in &rules.rules {
                println!(
                    "  [{}] {:<20} {:<8} {:<30} -> {}",
                    if rule.enabled { "x" } else { " " },
                    rule.id,
                    rule.severity,
                    rule.condition,
                    rule.notify_on.join(", ")
                );
            }
        }
        RulesCommands::Enable { rule_id } => set_rule_enabled(manager, &rule_id, true).await?,
        RulesCommands::Disable { rule_id } => set_rule_enabled(manager, &rule_id, false).await?,
        RulesCommands::ToggleAll { state } => {
            manager
                .update_rules(RuleSetPatch {
                    enabled: Some(state),
                    ..RuleSetPatch::default()
                })
                .await;
            println!("Alerting {}", if state { "enabled" } else { "disabled" });
        }
    }
    Ok(())
}

async fn set_rule_enabled(manager: &AlertManager, rule_id: &str, enabled: bool) -> anyhow::Result<()> {
    if !manager.update_rule(rule_id, AlertRulePatch::enabled(enabled)).await {
        return Err(agentwatch::Error::not_found("Rule", rule_id).into());
    }
    println!(
        "Rule {rule_id} {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

async fn run_history(
    manager: &AlertManager,
    agent: Option<String>,
    severity: Option<Severity>,
    rule: Option<String>,
    last: Option<Duration>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut query = AlertQuery::all();
    if let Some(agent) = agent {
        query = query.agent(agent);
    }
    if let Some(severity) = severity {
        query = query.severity(severity);
    }
    if let Some(rule) = rule {
        query = query.rule(rule);
    }
    if let Some(last) = last {
        let span = i64::try_from(last.as_millis()).unwrap_or(i64::MAX);
        query = query.since(Utc::now().timestamp_millis().saturating_sub(span));
    }

    let alerts = manager.history(&query).await;
    print_alerts(&alerts, format)
}

async fn run_stats(manager: &AlertManager, format: OutputFormat) -> anyhow::Result<()> {
    let stats = manager.statistics().await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Total alerts:     {}", stats.total_alerts);
    println!("Last 24 hours:    {}", stats.alerts_last_24h);
    println!(
        "  critical: {}  warning: {}  info: {}",
        stats.by_severity.critical, stats.by_severity.warning, stats.by_severity.info
    );
    println!("By rule (24h):");
    for (rule_id, count) in &stats.by_rule {
        println!("  {rule_id:<20} {count}");
    }
    Ok(())
}

async fn run_evaluate(
    manager: &AlertManager,
    config: &Config,
    path: &Path,
    notify: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot: MetricsSnapshot =
        serde_json::from_slice(&raw).context("invalid metrics snapshot")?;

    info!(agent_id = %snapshot.agent_id, "Evaluating snapshot");
    let alerts = manager.evaluate(&snapshot).await;
    print_alerts(&alerts, format)?;

    if notify && !alerts.is_empty() {
        for (channel, notifier) in build_notifiers(&config.notifiers) {
            manager.register_notifier(channel, notifier).await;
        }

        let results = manager.send_alerts(&alerts).await;
        for result in &results {
            match &result.error {
                None => println!("sent {} via {}", result.alert_id, result.channel),
                Some(e) => println!("failed {} via {}: {e}", result.alert_id, result.channel),
            }
        }
    }

    Ok(())
}

fn print_alerts(alerts: &[Alert], format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(alerts)?);
        return Ok(());
    }

    if alerts.is_empty() {
        println!("No alerts");
        return Ok(());
    }

    for alert in alerts {
        let time = Utc
            .timestamp_millis_opt(alert.timestamp)
            .single()
            .map_or_else(|| alert.timestamp.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        println!("{time}  {:<8}  {:<12}  {}", alert.severity, alert.agent_id, alert.message);
    }
    Ok(())
}
