//! Garbage collection handler.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use reencode_models::JobId;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// `?delta=<seconds>` query.
#[derive(Debug, Deserialize)]
pub struct GcQuery {
    pub delta: Option<String>,
}

/// Remove finished jobs older than `delta` seconds. Returns removed ids.
pub async fn collect_garbage(
    State(state): State<AppState>,
    Query(query): Query<GcQuery>,
) -> ApiResult<Json<Vec<JobId>>> {
    let delta = query
        .delta
        .map(|raw| parse_delta(&raw))
        .transpose()?;

    let removed = state.coordinator.gc(delta).await;
    metrics::record_jobs_collected(removed.len());

    Ok(Json(removed))
}

fn parse_delta(raw: &str) -> ApiResult<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| {
            ApiError::bad_request(format!(
                "delta must be a non-negative number of seconds, got {:?}",
                raw
            ))
        })
}
