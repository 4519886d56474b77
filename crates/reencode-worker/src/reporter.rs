//! Status reporting back to the coordinator.

use std::time::Duration;

use tracing::{debug, error, warn};

use reencode_client::{ClientError, CoordinatorClient};
use reencode_models::JobId;

use crate::retry::{retry_async_when, FailureTracker, RetryConfig, RetryResult};

/// Consecutive terminal-post failures logged before going quiet.
const MAX_LOGGED_FAILURES: u32 = 5;

/// Posts job statuses with the retry policy each kind of status needs.
///
/// In-progress statuses are best effort: a bounded number of retries, then
/// dropped. Terminal statuses are retried until the coordinator accepts
/// them, since losing one leaves the job unfinished forever.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    client: CoordinatorClient,
    progress_retry: RetryConfig,
    terminal_retry: RetryConfig,
}

impl StatusReporter {
    /// Create a reporter allowing `progress_retries` retries per in-progress post.
    pub fn new(client: CoordinatorClient, progress_retries: u32) -> Self {
        Self {
            client,
            progress_retry: RetryConfig::new("post_status")
                .with_max_retries(progress_retries)
                .with_base_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(10)),
            terminal_retry: RetryConfig::new("post_terminal_status")
                .with_base_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(60)),
        }
    }

    /// Override the backoff used by both kinds of post.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.progress_retry = self.progress_retry.with_base_delay(base_delay);
        self.terminal_retry = self.terminal_retry.with_base_delay(base_delay);
        self
    }

    /// Post an in-progress status. Returns whether the coordinator took it.
    pub async fn post_progress(&self, id: &JobId, text: &str) -> bool {
        let result = retry_async_when(
            &self.progress_retry,
            || self.client.post_status(id, text),
            ClientError::is_retryable,
        )
        .await;

        match result {
            RetryResult::Success(_) => true,
            RetryResult::Failed { error, .. } if error.is_not_found() => {
                warn!(job_id = %id, status = text, "Job no longer tracked, status dropped");
                false
            }
            RetryResult::Failed { error, attempts } => {
                warn!(
                    job_id = %id,
                    status = text,
                    attempts,
                    "Dropping status after failed posts: {}", error
                );
                false
            }
        }
    }

    /// Post a terminal status, retrying until it is accepted.
    ///
    /// Gives up only when the coordinator rejects the post outright
    /// (unknown job or bad request). Returns whether it was accepted.
    pub async fn post_terminal(&self, id: &JobId, text: &str) -> bool {
        let mut tracker = FailureTracker::new(MAX_LOGGED_FAILURES);
        let mut attempt = 0u32;

        loop {
            match self.client.post_status(id, text).await {
                Ok(job) => {
                    tracker.record_success();
                    debug!(job_id = %id, done = job.is_done(), "Terminal status posted");
                    return true;
                }
                Err(e) if e.is_not_found() => {
                    warn!(job_id = %id, status = text, "Job no longer tracked, terminal status abandoned");
                    return false;
                }
                Err(e @ ClientError::InvalidResponse(_)) => {
                    // 2xx: the status is stored even though the echo is unreadable
                    warn!(job_id = %id, status = text, "Terminal status accepted, bad reply: {}", e);
                    return true;
                }
                Err(e @ ClientError::BadRequest(_)) => {
                    error!(job_id = %id, status = text, "Coordinator rejected terminal status: {}", e);
                    return false;
                }
                Err(e) => {
                    if tracker.record_failure() {
                        warn!(
                            job_id = %id,
                            status = text,
                            attempt = attempt + 1,
                            "Failed to post terminal status, retrying: {}", e
                        );
                    }
                    tokio::time::sleep(self.terminal_retry.delay_for_attempt(attempt)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
