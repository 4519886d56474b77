//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] reencode_media::MediaError),

    #[error("Coordinator error: {0}")]
    Client(#[from] reencode_client::ClientError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether an external tool caused the failure.
    pub fn is_subprocess_failure(&self) -> bool {
        match self {
            WorkerError::Media(e) => e.is_subprocess_failure(),
            _ => false,
        }
    }
}
