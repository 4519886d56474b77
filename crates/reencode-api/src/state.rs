//! Application state.

use std::sync::Arc;

use reencode_queue::Coordinator;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    /// Create application state with an empty coordinator.
    pub fn new(config: ApiConfig) -> Self {
        let coordinator = Coordinator::new(config.coordinator.clone());
        Self::with_coordinator(config, Arc::new(coordinator))
    }

    /// Create application state around an existing coordinator.
    pub fn with_coordinator(config: ApiConfig, coordinator: Arc<Coordinator>) -> Self {
        Self {
            config,
            coordinator,
        }
    }
}
