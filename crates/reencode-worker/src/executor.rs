//! Worker loop and worker pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

use reencode_client::CoordinatorClient;
use reencode_media::{EncodingPipeline, ScanOutcome};
use reencode_models::Job;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::reporter::StatusReporter;
use crate::retry::FailureTracker;
use crate::status;

/// Consecutive pop failures logged before going quiet.
const MAX_LOGGED_POP_FAILURES: u32 = 3;

/// One worker loop: pop a job, run the pipeline, report, repeat.
pub struct Worker {
    name: String,
    client: CoordinatorClient,
    pipeline: Arc<dyn EncodingPipeline>,
    reporter: StatusReporter,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    /// Create a worker.
    pub fn new(
        name: impl Into<String>,
        client: CoordinatorClient,
        pipeline: Arc<dyn EncodingPipeline>,
        config: &WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            reporter: StatusReporter::new(client.clone(), config.status_retries),
            client,
            pipeline,
            poll_interval: config.poll_interval,
            shutdown,
        }
    }

    /// Replace the status reporter.
    pub fn with_reporter(mut self, reporter: StatusReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run until shutdown is signalled.
    ///
    /// Shutdown is only observed between jobs; a job in progress runs to
    /// its terminal status.
    pub async fn run(mut self) {
        info!(worker = %self.name, "Worker started");
        let mut pop_failures = FailureTracker::new(MAX_LOGGED_POP_FAILURES);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let worked = match self.client.pop().await {
                Ok(Some(job)) => {
                    pop_failures.record_success();
                    self.process(job).await;
                    true
                }
                Ok(None) => {
                    pop_failures.record_success();
                    debug!(worker = %self.name, "Queue empty");
                    false
                }
                Err(e) => {
                    if pop_failures.record_failure() {
                        warn!(worker = %self.name, "Failed to pop job: {}", e);
                    }
                    false
                }
            };

            if !worked {
                tokio::select! {
                    changed = self.shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        info!(worker = %self.name, "Worker stopped");
    }

    /// Process one popped job and post its terminal status.
    ///
    /// Never fails: every error becomes an `Error - …` status. Returns the
    /// terminal text that was posted.
    pub async fn process(&self, job: Job) -> String {
        let logger = JobLogger::new(&job.id, &self.name, &job.file);
        let span = logger.span();

        async {
            logger.started();

            // Own task, so a panicking pipeline cannot take the loop down
            let task = tokio::spawn(run_pipeline(
                Arc::clone(&self.pipeline),
                self.reporter.clone(),
                job.clone(),
                logger.clone(),
            ));
            let outcome = match task.await {
                Ok(result) => result,
                Err(e) => Err(WorkerError::job_failed(format!("pipeline task failed: {}", e))),
            };

            let text = match outcome {
                Ok(text) => {
                    logger.finished(&text);
                    text
                }
                Err(e) => {
                    logger.failed(&e.to_string());
                    status::for_error(&e).to_string()
                }
            };

            self.reporter.post_terminal(&job.id, &text).await;
            text
        }
        .instrument(span)
        .await
    }
}

/// scan → reencode → cleanup, posting progress between steps.
async fn run_pipeline(
    pipeline: Arc<dyn EncodingPipeline>,
    reporter: StatusReporter,
    job: Job,
    logger: JobLogger,
) -> WorkerResult<String> {
    let plan = match pipeline.scan(Path::new(&job.file)).await? {
        ScanOutcome::NotApplicable(reason) => {
            logger.step(&format!("skipping: {}", reason));
            return Ok(status::ALREADY_PROCESSED.to_string());
        }
        ScanOutcome::Plan(plan) => plan,
    };

    reporter.post_progress(&job.id, status::REENCODING).await;
    logger.step(status::REENCODING);
    pipeline.reencode(&plan).await?;

    reporter.post_progress(&job.id, status::CLEANING_UP).await;
    logger.step(status::CLEANING_UP);
    let report = pipeline.cleanup(plan).await?;

    Ok(status::reduced(&report))
}

/// Runs `worker_count` independent worker loops with graceful shutdown.
pub struct WorkerPool {
    config: WorkerConfig,
    client: CoordinatorClient,
    pipeline: Arc<dyn EncodingPipeline>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Create a pool talking to the coordinator in `config`.
    pub fn new(config: WorkerConfig, pipeline: Arc<dyn EncodingPipeline>) -> WorkerResult<Self> {
        let client = CoordinatorClient::new(config.client.clone())?;
        Ok(Self::with_client(config, client, pipeline))
    }

    /// Create a pool around an existing client.
    pub fn with_client(
        config: WorkerConfig,
        client: CoordinatorClient,
        pipeline: Arc<dyn EncodingPipeline>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            client,
            pipeline,
            shutdown,
        }
    }

    /// Run the workers until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> WorkerResult<()> {
        if self.config.worker_count == 0 {
            return Err(WorkerError::config_error("worker_count must be at least 1"));
        }

        let mut shutdown_rx = self.shutdown.subscribe();

        if !self.config.startup_delay.is_zero() {
            info!("Waiting {:?} before first poll", self.config.startup_delay);
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = tokio::time::sleep(self.config.startup_delay) => {}
            }
            if *shutdown_rx.borrow() {
                info!("Shutdown requested before start");
                return Ok(());
            }
        }

        info!(
            "Starting {} workers against {}",
            self.config.worker_count,
            self.client.base_url()
        );

        let mut workers = JoinSet::new();
        for i in 0..self.config.worker_count {
            let worker = Worker::new(
                format!("worker-{}", i),
                self.client.clone(),
                Arc::clone(&self.pipeline),
                &self.config,
                self.shutdown.subscribe(),
            );
            workers.spawn(worker.run());
        }

        while !*shutdown_rx.borrow_and_update() {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                joined = workers.join_next() => {
                    match joined {
                        Some(Err(e)) => warn!("Worker task ended abnormally: {}", e),
                        Some(Ok(())) => {}
                        None => break,
                    }
                }
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                "Workers still busy after {:?}, aborting",
                self.config.shutdown_timeout
            );
            workers.shutdown().await;
        }

        info!("Worker pool stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
