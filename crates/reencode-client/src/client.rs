//! Coordinator HTTP client.

use std::time::{Duration, Instant};

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use reencode_models::{Job, JobId};

use crate::error::{ClientError, ClientResult};

/// Configuration for the coordinator client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the coordinator
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for retryable failures
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("COORDINATOR_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8081".to_string()),
            timeout: Duration::from_secs(
                std::env::var("COORDINATOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("COORDINATOR_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }

    /// Same settings pointed at another coordinator.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Client for the job coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    http: Client,
    config: ClientConfig,
}

impl CoordinatorClient {
    /// Create a new coordinator client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Base URL of the coordinator.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check if the coordinator is healthy.
    pub async fn health(&self) -> ClientResult<bool> {
        match self.http.get(self.url("/health")).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy")
            }
            Ok(response) => {
                warn!("Coordinator health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Coordinator health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Submit `file` for processing.
    ///
    /// Single attempt: every push appends to the queue, so a resend after a
    /// lost response would dispatch the file twice.
    pub async fn push(&self, file: &str) -> ClientResult<Job> {
        let response = self
            .http
            .post(self.url("/queue/push"))
            .json(&serde_json::json!({ "file": file }))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Claim the oldest queued job. `None` when the queue is empty.
    pub async fn pop(&self) -> ClientResult<Option<Job>> {
        let url = self.url("/queue/pop");

        let response = self.http.get(&url).send().await?;
        match check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Current record of a job.
    pub async fn get_status(&self, id: &JobId) -> ClientResult<Job> {
        let url = self.url("/status");

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .get(&url)
                    .query(&[("job", id.as_str())])
                    .send()
                    .await?;
                check(response).await
            })
            .await?;

        Ok(response.json().await?)
    }

    /// Report a status text for a job. Single attempt; callers own retry.
    pub async fn post_status(&self, id: &JobId, text: &str) -> ClientResult<Job> {
        let response = self
            .http
            .post(self.url("/status"))
            .query(&[("job", id.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(text.to_string())
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Collect finished jobs older than `delta` (coordinator default if `None`).
    pub async fn gc(&self, delta: Option<Duration>) -> ClientResult<Vec<JobId>> {
        let mut request = self.http.post(self.url("/gc"));
        if let Some(delta) = delta {
            request = request.query(&[("delta", delta.as_secs())]);
        }

        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Poll `get_status` until the job is done.
    ///
    /// Returns [`ClientError::Timeout`] if `timeout` elapses first.
    pub async fn wait_for_completion(
        &self,
        id: &JobId,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> ClientResult<Job> {
        let started = Instant::now();

        loop {
            let job = self.get_status(id).await?;
            if job.is_done() {
                return Ok(job);
            }
            debug!(job_id = %id, status = %job.status, "Waiting for job");

            if let Some(timeout) = timeout {
                if started.elapsed() + poll_interval > timeout {
                    return Err(ClientError::Timeout(timeout.as_secs()));
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> ClientResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Coordinator request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map a non-success response to the matching error.
async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.detail)
        .unwrap_or_else(|_| body.clone());

    Err(match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(detail),
        StatusCode::BAD_REQUEST => ClientError::BadRequest(detail),
        _ => ClientError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        },
    })
}
