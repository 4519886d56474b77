//! API routes.

use axum::extract::State;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::ApiError;
use crate::handlers::{collect_garbage, get_status, health, pop_job, post_status, push_job, ready};
use crate::metrics::{metrics_middleware, set_queue_stats};
use crate::middleware::{request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let queue_routes = Router::new()
        .route("/queue/push", post(push_job))
        .route("/queue/pop", get(pop_job))
        .route("/status", get(get_status).post(post_status))
        .route("/gc", post(collect_garbage));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled). Queue gauges are refreshed on scrape.
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route(
            "/metrics",
            get(move |State(state): State<AppState>| async move {
                set_queue_stats(&state.coordinator.stats().await);
                handle.render()
            }),
        )
    } else {
        Router::new()
    };

    Router::new()
        .merge(queue_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .fallback(bad_path)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}

async fn bad_path() -> ApiError {
    ApiError::not_found("Bad path")
}
