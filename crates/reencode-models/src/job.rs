//! Job definitions for the dispatch queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::job_status::JobStatus;

/// Number of digest bytes kept in a job id (128 bits).
const JOB_ID_BYTES: usize = 16;

/// Unique identifier for a job.
///
/// Content-addressed: the first 128 bits of the SHA-256 digest of the
/// source path, as lowercase hex. The same path always maps to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Derive the id for a source file path.
    pub fn for_file(file: &str) -> Self {
        let digest = Sha256::digest(file.as_bytes());
        let hex = digest[..JOB_ID_BYTES]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self(hex)
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A tracked unit of work.
///
/// Serializes as a [`JobRecord`], the flat shape clients and workers see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "JobRecord", from = "JobRecord")]
pub struct Job {
    /// Content-addressed job ID
    pub id: JobId,
    /// Source path, opaque to the coordinator
    pub file: String,
    /// Current lifecycle status
    pub status: JobStatus,
    /// When the job was pushed (used for gc aging only)
    pub submit_time: DateTime<Utc>,
}

impl Job {
    /// Create a queued job for `file`.
    pub fn new(file: impl Into<String>, submit_time: DateTime<Utc>) -> Self {
        let file = file.into();
        Self {
            id: JobId::for_file(&file),
            file,
            status: JobStatus::Queued,
            submit_time,
        }
    }

    /// The `done` flag.
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    /// The `success` flag.
    pub fn success(&self) -> Option<bool> {
        self.status.success()
    }
}

/// Wire representation of a [`Job`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub file: String,
    pub status: String,
    pub done: bool,
    pub success: Option<bool>,
    /// Epoch seconds
    #[serde(with = "chrono::serde::ts_seconds")]
    pub submit_time: DateTime<Utc>,
}

impl From<Job> for JobRecord {
    fn from(job: Job) -> Self {
        Self {
            done: job.is_done(),
            success: job.success(),
            status: job.status.text().to_string(),
            id: job.id,
            file: job.file,
            submit_time: job.submit_time,
        }
    }
}

impl From<JobRecord> for Job {
    fn from(record: JobRecord) -> Self {
        Self {
            status: JobStatus::from_parts(record.status, record.done, record.success),
            id: record.id,
            file: record.file,
            submit_time: record.submit_time,
        }
    }
}
