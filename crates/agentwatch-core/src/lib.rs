//! # AgentWatch
//!
//! Alerting core for long-running AI agents.
//!
//! AgentWatch evaluates periodic metric snapshots of agents against a
//! persisted set of rules, suppresses repeats within a deduplication window,
//! keeps a bounded alert history, and delivers fired alerts to notification
//! channels with retry.
//!
//! ## Architecture
//!
//! - **Rules**: JSON rule set with a small, safe condition language
//! - **Engine**: `AlertManager` evaluates snapshots and records alerts
//! - **History**: bounded, write-through alert log with queries and statistics
//! - **Notifiers**: Email, Slack, GitHub issues and generic webhooks
//!
//! ## Quick Start
//!
//! ```bash
//! # Evaluate a snapshot and notify configured channels
//! agentwatch evaluate snapshot.json --notify
//!
//! # Inspect what fired
//! agentwatch history --last 1h
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertManager, Notifier, NotifierOptions};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}
