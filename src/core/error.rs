//! Error taxonomy for the deadline core
//!
//! Validation and not-found errors are returned to the command that caused
//! them. Persistence and delivery errors are logged where they happen and
//! never stop the reminder pipeline.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

/// Errors raised by the deadline core
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Malformed or past-dated input
    #[error("validation error: {0}")]
    Validation(String),

    /// No deadline with this id
    #[error("deadline {0} not found")]
    NotFound(u64),

    /// No scheduled job with this name
    #[error("job {0} not found")]
    JobNotFound(String),

    /// Store read or write failure
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Notifier failure for a single recipient
    #[error("delivery to {destination} failed: {reason}")]
    Delivery { destination: String, reason: String },

    /// Invalid or missing configuration
    #[error("config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Persistence(err.to_string())
    }
}

/// Result alias for core operations
pub type BotResult<T> = std::result::Result<T, BotError>;
