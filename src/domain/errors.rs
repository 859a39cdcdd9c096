use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Scheduled time is in the past: {0}")]
    ScheduledInPast(String),
    #[error("Invalid scheduled time '{value}': {reason}")]
    InvalidSchedule { value: String, reason: String },
    #[error("Operation not allowed: {0}")]
    Forbidden(String),
    #[error("Corrupt job state under '{key}': {value}")]
    CorruptState { key: String, value: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
