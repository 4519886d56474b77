//! Shared job models for the reencode coordinator and workers.
//!
//! This crate provides Serde-serializable types for:
//! - Job identifiers derived from the source path
//! - The job lifecycle state machine
//! - The wire record exchanged with clients and workers

pub mod job;
pub mod job_status;

// Re-export common types
pub use job::{Job, JobId, JobRecord};
pub use job_status::{
    JobStatus, DISPATCHED, DONE_PREFIX, ERROR_PREFIX, QUEUED,
};
