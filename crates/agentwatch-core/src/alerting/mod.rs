//! Alerting core for AgentWatch
//!
//! Evaluates agent metric snapshots against a persisted rule set, suppresses
//! repeats within a deduplication window, keeps a bounded alert history, and
//! fans fired alerts out to notification channels with retry.

pub mod condition;
mod dedup;
mod dispatcher;
mod engine;
mod history;
pub mod notifier;
mod persist;
mod rules;

pub use condition::{Condition, ConditionError, EvalContext, Field, Value};
pub use dedup::{DedupWindow, DEFAULT_DEDUP_WINDOW};
pub use dispatcher::NotificationDispatcher;
pub use engine::{render_message, AlertManager};
pub use history::{AlertHistory, DEFAULT_HISTORY_LIMIT};
pub use notifier::{
    build_notifiers, format_alert, retry_with_backoff, NotificationError, NotificationResult,
    Notifier, NotifierOptions,
};
pub use rules::RuleStore;
