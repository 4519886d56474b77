//! Coordinator serving push/pop/status/gc over a shared job board.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use reencode_models::{Job, JobId};

use crate::board::{JobBoard, QueueStats, StatusUpdate};
use crate::error::QueueResult;

/// Default age past which finished jobs are collected (30 days).
pub const DEFAULT_GC_DELTA: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// gc age cutoff used when the caller does not pass one
    pub default_gc_delta: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_gc_delta: DEFAULT_GC_DELTA,
        }
    }
}

impl CoordinatorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            default_gc_delta: std::env::var("GC_DEFAULT_DELTA_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_GC_DELTA),
        }
    }
}

/// Owner of the job registry and dispatch queue.
///
/// Every operation runs inside one critical section covering both
/// collections, so no two operations interleave.
#[derive(Debug)]
pub struct Coordinator {
    board: Mutex<JobBoard>,
    config: CoordinatorConfig,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl Coordinator {
    /// Create a coordinator with an empty board.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            board: Mutex::new(JobBoard::new()),
            config,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(CoordinatorConfig::from_env())
    }

    /// Submit `file` for processing.
    pub async fn push(&self, file: &str) -> QueueResult<Job> {
        let job = self.board.lock().await.push(file, Utc::now())?;
        info!(job_id = %job.id, file = %job.file, "Enqueued job");
        Ok(job)
    }

    /// Hand the oldest queued job to a worker.
    pub async fn pop(&self) -> QueueResult<Job> {
        let job = self.board.lock().await.pop()?;
        info!(job_id = %job.id, file = %job.file, "Dispatched job");
        Ok(job)
    }

    /// Current record for `id`.
    pub async fn get_status(&self, id: &JobId) -> QueueResult<Job> {
        self.board.lock().await.get(id)
    }

    /// Record a status text posted by a worker.
    pub async fn post_status(
        &self,
        id: &JobId,
        text: impl Into<String>,
    ) -> QueueResult<StatusUpdate> {
        let update = self.board.lock().await.post_status(id, text)?;
        if update.finished {
            info!(
                job_id = %update.job.id,
                success = ?update.job.success(),
                status = %update.job.status,
                "Job finished"
            );
        }
        Ok(update)
    }

    /// Collect finished jobs older than `delta` (or the configured default).
    pub async fn gc(&self, delta: Option<Duration>) -> Vec<JobId> {
        let delta = delta.unwrap_or(self.config.default_gc_delta);
        let cutoff = cutoff_for(Utc::now(), delta);

        let removed = self.board.lock().await.collect_garbage(cutoff);
        if removed.is_empty() {
            debug!(cutoff = %cutoff, "gc found nothing to collect");
        } else {
            info!(count = removed.len(), cutoff = %cutoff, "Collected finished jobs");
        }
        removed
    }

    /// Occupancy snapshot.
    pub async fn stats(&self) -> QueueStats {
        self.board.lock().await.stats()
    }

    /// gc age cutoff used when the caller does not pass one.
    pub fn default_gc_delta(&self) -> Duration {
        self.config.default_gc_delta
    }
}

/// `now - delta`, saturating at the earliest representable time.
fn cutoff_for(now: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delta)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;

    #[test]
    fn test_config_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.default_gc_delta, Duration::from_secs(2_592_000));
    }

    #[test]
    fn test_cutoff_saturates() {
        let now = Utc::now();
        assert_eq!(cutoff_for(now, Duration::ZERO), now);
        assert_eq!(cutoff_for(now, Duration::from_secs(u64::MAX)), DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn test_push_then_status() {
        let coordinator = Coordinator::default();
        let job = coordinator.push("/videos/a.mkv").await.unwrap();

        assert_eq!(job.id, JobId::for_file("/videos/a.mkv"));
        let status = coordinator.get_status(&job.id).await.unwrap();
        assert_eq!(status.status.text(), "queued");
        assert!(!status.is_done());
    }

    #[tokio::test]
    async fn test_pop_then_empty() {
        let coordinator = Coordinator::default();
        let job = coordinator.push("/videos/a.mkv").await.unwrap();

        let popped = coordinator.pop().await.unwrap();
        assert_eq!(popped.id, job.id);
        assert_eq!(popped.status.text(), "dispatched");
        assert!(matches!(coordinator.pop().await, Err(QueueError::QueueEmpty)));
    }

    #[tokio::test]
    async fn test_done_then_gc_zero() {
        let coordinator = Coordinator::default();
        let job = coordinator.push("/videos/a.mkv").await.unwrap();
        coordinator.pop().await.unwrap();
        coordinator.post_status(&job.id, "Done").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let removed = coordinator.gc(Some(Duration::ZERO)).await;
        assert_eq!(removed, vec![job.id.clone()]);
        assert!(matches!(
            coordinator.get_status(&job.id).await,
            Err(QueueError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_default_gc_keeps_recent_jobs() {
        let coordinator = Coordinator::default();
        let job = coordinator.push("/videos/a.mkv").await.unwrap();
        coordinator.post_status(&job.id, "Done").await.unwrap();

        assert!(coordinator.gc(None).await.is_empty());
        assert_eq!(coordinator.stats().await.tracked, 1);
    }

    #[tokio::test]
    async fn test_concurrent_terminal_posts_finish_once() {
        let coordinator = std::sync::Arc::new(Coordinator::default());
        let job = coordinator.push("/videos/a.mkv").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = std::sync::Arc::clone(&coordinator);
            let id = job.id.clone();
            handles.push(tokio::spawn(async move {
                coordinator.post_status(&id, "Done").await.unwrap().finished
            }));
        }

        let mut finished = 0;
        for handle in handles {
            if handle.await.unwrap() {
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
    }

    #[tokio::test]
    async fn test_concurrent_pops_dispatch_each_job_once() {
        let coordinator = std::sync::Arc::new(Coordinator::default());
        for i in 0..50 {
            coordinator.push(&format!("/videos/{}.mkv", i)).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = std::sync::Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::new();
                while let Ok(job) = coordinator.pop().await {
                    ids.push(job.id);
                }
                ids
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 50);
    }
}
