//! Agent metrics data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status reported for an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Agent process is alive
    Running,
    /// Agent was stopped deliberately
    Stopped,
    /// Agent exited with an error
    Failed,
}

impl AgentStatus {
    /// Wire name of the status, as used in rule conditions
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Running => "running",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time metrics for one agent, produced by the agent monitor
/// for each evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Agent identifier
    pub agent_id: String,

    /// Display name of the agent
    pub agent_name: String,

    /// Current status
    pub status: AgentStatus,

    /// Fraction of successful executions (0.0 - 1.0)
    pub success_rate: f64,

    /// Duration of the last execution in milliseconds
    pub execution_time: f64,

    /// Tokens consumed
    pub total_tokens: u64,

    /// Number of errors seen, if tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u64>,

    /// CPU usage percentage, if sampled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,

    /// Memory usage, if sampled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
}

impl MetricsSnapshot {
    /// Create a snapshot with the required fields; optional samples start empty.
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        status: AgentStatus,
        success_rate: f64,
        execution_time: f64,
        total_tokens: u64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            status,
            success_rate,
            execution_time,
            total_tokens,
            error_count: None,
            cpu_usage: None,
            memory_usage: None,
        }
    }

    /// Whether the agent has failed
    pub fn is_failed(&self) -> bool {
        self.status == AgentStatus::Failed
    }
}
