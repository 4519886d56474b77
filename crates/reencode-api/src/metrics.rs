//! Prometheus metrics for the coordinator.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use reencode_queue::QueueStats;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "reencode_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "reencode_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "reencode_http_requests_in_flight";

    // Queue metrics
    pub const QUEUE_LENGTH: &str = "reencode_queue_length";
    pub const JOBS_TRACKED: &str = "reencode_jobs_tracked";
    pub const JOBS_PUSHED_TOTAL: &str = "reencode_jobs_pushed_total";
    pub const JOBS_DISPATCHED_TOTAL: &str = "reencode_jobs_dispatched_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reencode_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reencode_jobs_failed_total";
    pub const JOBS_COLLECTED_TOTAL: &str = "reencode_jobs_collected_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route_label(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update queue gauges from an occupancy snapshot.
pub fn set_queue_stats(stats: &QueueStats) {
    gauge!(names::QUEUE_LENGTH).set(stats.queue_length as f64);
    gauge!(names::JOBS_TRACKED, "phase" => "queued").set(stats.queued as f64);
    gauge!(names::JOBS_TRACKED, "phase" => "dispatched").set(stats.dispatched as f64);
    gauge!(names::JOBS_TRACKED, "phase" => "in_progress").set(stats.in_progress as f64);
    gauge!(names::JOBS_TRACKED, "phase" => "succeeded").set(stats.succeeded as f64);
    gauge!(names::JOBS_TRACKED, "phase" => "failed").set(stats.failed as f64);
}

/// Record job pushed.
pub fn record_job_pushed() {
    counter!(names::JOBS_PUSHED_TOTAL).increment(1);
}

/// Record job handed to a worker.
pub fn record_job_dispatched() {
    counter!(names::JOBS_DISPATCHED_TOTAL).increment(1);
}

/// Record job completed.
pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

/// Record job failed.
pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

/// Record jobs removed by gc.
pub fn record_jobs_collected(count: usize) {
    counter!(names::JOBS_COLLECTED_TOTAL).increment(count as u64);
}

/// Path label for metrics. Unknown paths share one label.
fn route_label(path: &str) -> &'static str {
    match path {
        "/queue/push" => "/queue/push",
        "/queue/pop" => "/queue/pop",
        "/status" => "/status",
        "/gc" => "/gc",
        "/health" => "/health",
        "/healthz" => "/healthz",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "unmatched",
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label() {
        assert_eq!(route_label("/queue/pop"), "/queue/pop");
        assert_eq!(route_label("/status"), "/status");
        assert_eq!(route_label("/queue/pop/extra"), "unmatched");
        assert_eq!(route_label("/../../etc/passwd"), "unmatched");
    }
}
