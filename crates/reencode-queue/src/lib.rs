//! In-memory job registry and FIFO dispatch queue.
//!
//! This crate provides:
//! - The job board: registry of every tracked job plus the pending FIFO
//! - The coordinator: one critical section around the board, serving
//!   push/pop/status/gc atomically

pub mod board;
pub mod coordinator;
pub mod error;

pub use board::{JobBoard, QueueStats, StatusUpdate};
pub use coordinator::{Coordinator, CoordinatorConfig, DEFAULT_GC_DELTA};
pub use error::{QueueError, QueueResult};
