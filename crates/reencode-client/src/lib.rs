//! HTTP client for the job coordinator.
//!
//! Used by workers to pop jobs and report status, and by submitters to push
//! files and wait for them to finish.

pub mod client;
pub mod error;

pub use client::{ClientConfig, CoordinatorClient};
pub use error::{ClientError, ClientResult};
