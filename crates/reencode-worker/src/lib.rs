//! Re-encoding worker.
//!
//! This crate provides:
//! - The worker loop: pop, scan, reencode, clean up, report
//! - A pool running several loops with graceful shutdown
//! - Status reporting with retry
//! - Structured per-job logging

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod reporter;
pub mod retry;
pub mod status;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{Worker, WorkerPool};
pub use logging::JobLogger;
pub use reporter::StatusReporter;
