//! Job registry and dispatch queue.
//!
//! The board is plain data with synchronous operations. It does no locking
//! and reads no clock; the [`Coordinator`](crate::Coordinator) wraps it in a
//! single critical section and supplies the current time.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use reencode_models::{Job, JobId, JobStatus};

use crate::error::{QueueError, QueueResult};

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Entries waiting in the dispatch queue
    pub queue_length: usize,
    /// Jobs tracked in the registry
    pub tracked: usize,
    pub queued: usize,
    pub dispatched: usize,
    pub in_progress: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of a posted status.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// The record after the post
    pub job: Job,
    /// This post is the one that moved the job into a terminal status
    pub finished: bool,
}

/// Registry of every tracked job plus the FIFO of ids awaiting dispatch.
///
/// Every id in the queue has a registry entry. A job leaves the queue only
/// through [`JobBoard::pop`].
#[derive(Debug, Default)]
pub struct JobBoard {
    queue: VecDeque<JobId>,
    registry: HashMap<JobId, Job>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queued job for `file` and append it to the queue.
    ///
    /// Pushing a path that is already tracked replaces the registry entry
    /// and adds a second queue entry for the same id.
    pub fn push(&mut self, file: &str, now: DateTime<Utc>) -> QueueResult<Job> {
        if file.trim().is_empty() {
            return Err(QueueError::invalid_input("file must be a non-empty path"));
        }

        let job = Job::new(file, now);
        if let Some(previous) = self.registry.get(&job.id) {
            warn!(
                job_id = %job.id,
                previous_status = %previous.status,
                "Resubmitted file replaces tracked job"
            );
        }

        self.queue.push_back(job.id.clone());
        self.registry.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    /// Take the head of the queue and mark it dispatched.
    pub fn pop(&mut self) -> QueueResult<Job> {
        loop {
            let id = self.queue.pop_front().ok_or(QueueError::QueueEmpty)?;
            match self.registry.get_mut(&id) {
                Some(job) => {
                    job.status = JobStatus::Dispatched;
                    return Ok(job.clone());
                }
                None => {
                    error!(job_id = %id, "Queued job missing from registry, skipping");
                }
            }
        }
    }

    /// Current record for `id`.
    pub fn get(&self, id: &JobId) -> QueueResult<Job> {
        self.registry
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::JobNotFound(id.clone()))
    }

    /// Apply a worker-posted status text to `id`.
    pub fn post_status(
        &mut self,
        id: &JobId,
        text: impl Into<String>,
    ) -> QueueResult<StatusUpdate> {
        let job = self
            .registry
            .get_mut(id)
            .ok_or_else(|| QueueError::JobNotFound(id.clone()))?;

        let next = job.status.apply_report(text);
        if job.status.is_terminal() {
            warn!(
                job_id = %id,
                from = %job.status,
                to = %next,
                "Status posted to a finished job"
            );
        }
        debug!(job_id = %id, status = %next, "Status change");
        let finished = !job.status.is_terminal() && next.is_terminal();
        job.status = next;
        Ok(StatusUpdate {
            job: job.clone(),
            finished,
        })
    }

    /// Remove finished jobs submitted before `cutoff` that are not queued.
    ///
    /// Returns the removed ids in sorted order.
    pub fn collect_garbage(&mut self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        let queued: HashSet<&JobId> = self.queue.iter().collect();

        let mut garbage: Vec<JobId> = self
            .registry
            .iter()
            .filter(|(id, job)| {
                job.submit_time < cutoff && job.is_done() && !queued.contains(id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        garbage.sort();

        for id in &garbage {
            self.registry.remove(id);
        }
        garbage
    }

    /// Occupancy counts.
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            queue_length: self.queue.len(),
            tracked: self.registry.len(),
            ..Default::default()
        };
        for job in self.registry.values() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Dispatched => stats.dispatched += 1,
                JobStatus::InProgress(_) => stats.in_progress += 1,
                JobStatus::Succeeded(_) => stats.succeeded += 1,
                JobStatus::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }

    /// Entries waiting for dispatch.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Jobs tracked in the registry.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}
