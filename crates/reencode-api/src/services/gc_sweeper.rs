//! Background service that periodically collects finished jobs.
//!
//! Runs `gc` with the coordinator's default age cutoff, so finished
//! records do not pile up when no client ever calls `/gc`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use reencode_queue::Coordinator;

use crate::metrics;

/// Periodic gc sweeper.
pub struct GcSweeper {
    coordinator: Arc<Coordinator>,
    interval: Duration,
}

impl GcSweeper {
    /// Create a sweeper that runs every `interval`.
    pub fn new(coordinator: Arc<Coordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Start the background sweep loop.
    ///
    /// This function runs indefinitely and should be spawned as a background task.
    pub async fn run(&self) {
        info!(
            "Starting gc sweeper (interval: {:?}, cutoff: {:?})",
            self.interval,
            self.coordinator.default_gc_delta()
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    /// Run a single sweep. Returns the number of jobs removed.
    pub async fn sweep(&self) -> usize {
        let removed = self.coordinator.gc(None).await;
        if removed.is_empty() {
            debug!("gc sweep removed nothing");
        } else {
            metrics::record_jobs_collected(removed.len());
        }
        removed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reencode_queue::CoordinatorConfig;

    #[tokio::test]
    async fn test_sweep_uses_default_delta() {
        let coordinator = Arc::new(Coordinator::new(CoordinatorConfig {
            default_gc_delta: Duration::ZERO,
        }));
        let job = coordinator.push("/videos/a.mkv").await.unwrap();
        coordinator.pop().await.unwrap();
        coordinator.post_status(&job.id, "Done").await.unwrap();
        coordinator.push("/videos/b.mkv").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let sweeper = GcSweeper::new(Arc::clone(&coordinator), Duration::from_secs(60));
        assert_eq!(sweeper.sweep().await, 1);
        assert_eq!(coordinator.stats().await.tracked, 1);
    }
}
