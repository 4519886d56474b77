//! Worker configuration.

use std::time::Duration;

use reencode_client::ClientConfig;
use reencode_media::EncodeSettings;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Independent worker loops in this process
    pub worker_count: usize,
    /// Sleep between polls of an empty queue
    pub poll_interval: Duration,
    /// Wait before the first poll so the coordinator can come up
    pub startup_delay: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Retries for in-progress status posts
    pub status_retries: u32,
    /// Coordinator connection
    pub client: ClientConfig,
    /// Encoder settings
    pub encode: EncodeSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            poll_interval: Duration::from_secs(10),
            startup_delay: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
            status_retries: 5,
            client: ClientConfig::default(),
            encode: EncodeSettings::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            worker_count: std::env::var("WORKER_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            poll_interval: Duration::from_secs(
                std::env::var("WORKER_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            startup_delay: Duration::from_secs(
                std::env::var("WORKER_STARTUP_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            status_retries: std::env::var("WORKER_STATUS_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            client: ClientConfig::from_env(),
            encode: EncodeSettings::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.startup_delay, Duration::from_secs(5));
        assert_eq!(config.encode.target_bitrate, 2_000_000);
    }
}
