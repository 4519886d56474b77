//! Axum HTTP binding for the job coordinator.
//!
//! This crate provides:
//! - The push/pop/status/gc request/response contract
//! - Health, readiness and Prometheus metrics endpoints
//! - Request logging and request ids
//! - An optional background gc sweeper

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::GcSweeper;
pub use state::AppState;
