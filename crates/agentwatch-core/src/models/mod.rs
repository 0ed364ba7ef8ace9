//! Data models for AgentWatch

mod alert;
mod metrics;

pub use alert::*;
pub use metrics::*;
