//! Push and pop handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use reencode_models::Job;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Push request body.
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub file: String,
}

/// Submit a file for processing.
///
/// The body is parsed by hand so malformed JSON and a missing `file` key
/// get distinct messages.
pub async fn push_job(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Job>> {
    let request: PushRequest = serde_json::from_slice(&body).map_err(|e| {
        if e.is_data() {
            ApiError::bad_request(format!(r#"Must include the "file" key in request: {}"#, e))
        } else {
            ApiError::bad_request(format!("Must send JSON data: {}", e))
        }
    })?;

    let job = state.coordinator.push(&request.file).await?;
    metrics::record_job_pushed();

    Ok(Json(job))
}

/// Hand the oldest queued job to the calling worker.
pub async fn pop_job(State(state): State<AppState>) -> ApiResult<Json<Job>> {
    let job = state.coordinator.pop().await?;
    metrics::record_job_dispatched();
    debug!(job_id = %job.id, "Popped job");

    Ok(Json(job))
}
