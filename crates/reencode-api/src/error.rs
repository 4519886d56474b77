//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use reencode_queue::QueueError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Queue(QueueError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Queue(QueueError::QueueEmpty | QueueError::JobNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        (self.status_code(), Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reencode_models::JobId;

    #[test]
    fn test_queue_error_status_codes() {
        let cases = [
            (ApiError::from(QueueError::QueueEmpty), StatusCode::NOT_FOUND),
            (
                ApiError::from(QueueError::JobNotFound(JobId::from("abc"))),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(QueueError::invalid_input("empty")),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::bad_request("missing job"), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_body_is_detail() {
        let response = ApiError::from(QueueError::QueueEmpty).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body, serde_json::json!({ "detail": QueueError::QueueEmpty.to_string() }));
    }
}
