//! Request handlers.

pub mod gc;
pub mod health;
pub mod queue;
pub mod status;

pub use gc::*;
pub use health::*;
pub use queue::*;
pub use status::*;
