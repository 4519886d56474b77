//! Per-job log context.

use tracing::{error, info, Span};

use reencode_models::JobId;

/// Log helper for one popped job.
///
/// Every line and the span carry the job id and the worker name, so a
/// job can be followed across the worker's interleaved output.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    worker: String,
    file: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, worker: &str, file: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            worker: worker.to_string(),
            file: file.to_string(),
        }
    }

    pub fn started(&self) {
        info!(
            job_id = %self.job_id,
            worker = %self.worker,
            file = %self.file,
            "Processing job"
        );
    }

    /// A pipeline step, or the reason a file is skipped.
    pub fn step(&self, step: &str) {
        info!(job_id = %self.job_id, worker = %self.worker, step, "Job step");
    }

    pub fn finished(&self, status: &str) {
        info!(job_id = %self.job_id, worker = %self.worker, status, "Job finished");
    }

    pub fn failed(&self, cause: &str) {
        error!(
            job_id = %self.job_id,
            worker = %self.worker,
            file = %self.file,
            "Job failed: {}", cause
        );
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, worker = %self.worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_keeps_context() {
        let id = JobId::for_file("/videos/a.mkv");
        let logger = JobLogger::new(&id, "worker-0", "/videos/a.mkv");

        assert_eq!(logger.worker(), "worker-0");
        assert_eq!(logger.job_id, id.as_str());
        assert_eq!(logger.file, "/videos/a.mkv");
    }
}
