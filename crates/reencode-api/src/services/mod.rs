//! Background services.

pub mod gc_sweeper;

pub use gc_sweeper::GcSweeper;
