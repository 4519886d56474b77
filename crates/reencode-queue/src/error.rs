//! Queue error types.

use reencode_models::JobId;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Queue empty")]
    QueueEmpty,

    #[error("Job not found: {0}")]
    JobNotFound(JobId),
}

impl QueueError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Expected "nothing there" conditions that callers retry rather than fail on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::QueueEmpty | QueueError::JobNotFound(_))
    }
}
