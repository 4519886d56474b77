//! Status handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use reencode_models::{Job, JobId};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// `?job=<id>` query.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub job: Option<String>,
}

impl StatusQuery {
    fn job_id(self) -> ApiResult<JobId> {
        self.job
            .map(JobId::from)
            .ok_or_else(|| ApiError::bad_request(r#"Must send a "job" query"#))
    }
}

/// Current record of a job.
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Job>> {
    let id = query.job_id()?;
    let job = state.coordinator.get_status(&id).await?;
    Ok(Json(job))
}

/// Record a status text posted by a worker. The body is the raw text.
pub async fn post_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    body: String,
) -> ApiResult<Json<Job>> {
    let id = query.job_id()?;
    let update = state.coordinator.post_status(&id, body).await?;

    if update.finished {
        match update.job.success() {
            Some(true) => metrics::record_job_completed(),
            Some(false) => metrics::record_job_failed(),
            None => {}
        }
    }

    Ok(Json(update.job))
}
