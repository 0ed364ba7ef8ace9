//! Error types for AgentWatch

use thiserror::Error;

use crate::alerting::{ConditionError, NotificationError};

/// Result type alias using AgentWatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for AgentWatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of thing looked up
        entity: String,
        /// Id that was not found
        id: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rule condition could not be parsed
    #[error("Condition error: {0}")]
    Condition(#[from] ConditionError),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
