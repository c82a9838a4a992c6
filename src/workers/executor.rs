//! # Queue Worker
//!
//! The reusable [`WorkerHandle`] every job type runs on. A single poll loop
//! pulls jobs from a [`JobSource`], at most `concurrency` jobs execute at once,
//! and every execution goes through the retry executor so recoverable failures
//! are retried with backoff before the job is reported failed.
//!
//! Status updates for the UI go through a [`StatusBroadcaster`]; a failed
//! broadcast is logged and never affects the job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ImporterConfig;
use crate::error::{ImporterError, Result};
use crate::health::HealthMonitor;
use crate::logging::log_classified_error;
use crate::resilience::{classify, RetryExecutor, RetryPolicy, TypedError};
use crate::system::ServiceContext;
use crate::workers::traits::{JobType, WorkerFactory, WorkerHandle, WorkerStatus};

/// A unit of background work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: JobType, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

/// Durable queue boundary for one job type
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Next available job, `None` when the queue is empty
    async fn next_job(&self) -> anyhow::Result<Option<Job>>;

    async fn complete(&self, job: &Job) -> anyhow::Result<()>;

    /// Report a job that exhausted its retries or failed permanently
    async fn fail(&self, job: &Job, error: &TypedError) -> anyhow::Result<()>;
}

/// Business logic for one job type
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// `attempt` is 1-based
    async fn handle(&self, job: &Job, attempt: u32) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Retrying,
    Completed,
    Failed,
}

/// Progress notification pushed to connected clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusUpdate {
    pub job_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Realtime status channel
#[async_trait]
pub trait StatusBroadcaster: Send + Sync {
    async fn broadcast(&self, update: &JobStatusUpdate) -> anyhow::Result<()>;
}

/// Broadcaster that drops every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

#[async_trait]
impl StatusBroadcaster for NoopBroadcaster {
    async fn broadcast(&self, _update: &JobStatusUpdate) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Per-worker execution settings
#[derive(Debug, Clone)]
pub struct QueueWorkerConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for QueueWorkerConfig {
    fn default() -> Self {
        Self::from(&ImporterConfig::default())
    }
}

impl From<&ImporterConfig> for QueueWorkerConfig {
    fn from(config: &ImporterConfig) -> Self {
        Self {
            concurrency: config.workers.concurrency.max(1),
            poll_interval: config.workers.poll_interval(),
            retry: config.retry.policy(),
        }
    }
}

#[derive(Debug, Default)]
struct WorkerCounters {
    in_flight: AtomicUsize,
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// State shared between the handle, the poll loop and every execution task
struct WorkerCore {
    name: String,
    job_type: JobType,
    source: Arc<dyn JobSource>,
    handler: Arc<dyn JobHandler>,
    broadcaster: Arc<dyn StatusBroadcaster>,
    health: Option<Arc<HealthMonitor>>,
    retry: RetryExecutor,
    poll_interval: Duration,
    permits: Arc<Semaphore>,
    running: AtomicBool,
    shutdown: Notify,
    counters: WorkerCounters,
}

impl WorkerCore {
    async fn poll_loop(self: Arc<Self>) {
        info!(worker = %self.name, job_type = %self.job_type, "Starting poll loop");

        while self.running.load(Ordering::Acquire) {
            if let Some(health) = &self.health {
                if !health.is_healthy().await {
                    debug!(worker = %self.name, "Service unhealthy, pausing polling");
                    if self.idle().await {
                        break;
                    }
                    continue;
                }
            }

            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shutdown.notified() => break,
            };
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            match self.source.next_job().await {
                Ok(Some(job)) => {
                    self.counters.in_flight.fetch_add(1, Ordering::AcqRel);
                    let core = Arc::clone(&self);
                    tokio::spawn(async move {
                        core.execute(job).await;
                        core.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    if self.idle().await {
                        break;
                    }
                }
                Err(error) => {
                    drop(permit);
                    let typed = classify(&error).with_context("worker", self.name.as_str());
                    log_classified_error("next_job", &typed);
                    if self.idle().await {
                        break;
                    }
                }
            }
        }

        info!(worker = %self.name, "Poll loop ended");
    }

    /// Wait one poll interval; `true` if shutdown was signalled meanwhile
    async fn idle(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => !self.running.load(Ordering::Acquire),
            _ = self.shutdown.notified() => true,
        }
    }

    async fn execute(&self, job: Job) {
        self.broadcast(&job, JobStatus::Processing, 1, None).await;

        let operation = format!("{}:{}", self.job_type, job.id);
        let mut last_attempt = 1;
        let outcome = self
            .retry
            .run(&operation, |attempt| {
                last_attempt = attempt;
                let job = &job;
                async move {
                    if attempt > 1 {
                        self.counters.retried.fetch_add(1, Ordering::Relaxed);
                        self.broadcast(job, JobStatus::Retrying, attempt, None).await;
                    }
                    self.handler.handle(job, attempt).await
                }
            })
            .await;

        match outcome {
            Ok(()) => {
                if let Err(error) = self.source.complete(&job).await {
                    warn!(worker = %self.name, job_id = %job.id, error = %error, "Failed to acknowledge job");
                }
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                debug!(worker = %self.name, job_id = %job.id, attempts = last_attempt, "Job completed");
                self.broadcast(&job, JobStatus::Completed, last_attempt, None).await;
            }
            Err(typed) => {
                let typed = typed
                    .with_context("job_id", job.id.as_str())
                    .with_context("attempts", last_attempt);
                if let Err(error) = self.source.fail(&job, &typed).await {
                    warn!(worker = %self.name, job_id = %job.id, error = %error, "Failed to report job failure");
                }
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker = %self.name,
                    job_id = %job.id,
                    attempts = last_attempt,
                    kind = %typed.kind,
                    "Job failed"
                );
                self.broadcast(&job, JobStatus::Failed, last_attempt, Some(typed.message.clone()))
                    .await;
            }
        }
    }

    async fn broadcast(&self, job: &Job, status: JobStatus, attempt: u32, error: Option<String>) {
        let update = JobStatusUpdate {
            job_id: job.id.clone(),
            job_type: self.job_type,
            status,
            attempt,
            error,
            timestamp: Utc::now(),
        };
        if let Err(error) = self.broadcaster.broadcast(&update).await {
            warn!(worker = %self.name, job_id = %job.id, error = %error, "Status broadcast failed");
        }
    }
}

/// Polling worker for one job type
pub struct QueueWorker {
    core: Arc<WorkerCore>,
    concurrency: usize,
    closed: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for QueueWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueWorker")
            .field("name", &self.core.name)
            .field("job_type", &self.core.job_type)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl QueueWorker {
    pub fn builder(
        job_type: JobType,
        source: Arc<dyn JobSource>,
        handler: Arc<dyn JobHandler>,
    ) -> QueueWorkerBuilder {
        QueueWorkerBuilder {
            name: job_type.name().to_string(),
            job_type,
            source,
            handler,
            broadcaster: Arc::new(NoopBroadcaster),
            health: None,
            config: QueueWorkerConfig::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn job_type(&self) -> JobType {
        self.core.job_type
    }
}

#[async_trait]
impl WorkerHandle for QueueWorker {
    /// Stop polling, then wait until every in-flight job has finished
    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!(worker = %self.core.name, "Closing worker");
        self.core.running.store(false, Ordering::Release);
        self.core.shutdown.notify_one();

        let poll_task = self.poll_task.lock().take();
        if let Some(task) = poll_task {
            task.await.map_err(|e| {
                ImporterError::Worker(format!("{} poll loop panicked: {e}", self.core.name))
            })?;
        }

        let permits = u32::try_from(self.concurrency).map_err(|_| {
            ImporterError::Worker(format!("{} concurrency out of range", self.core.name))
        })?;
        let _drained = self
            .core
            .permits
            .acquire_many(permits)
            .await
            .map_err(|e| ImporterError::Worker(format!("{} drain failed: {e}", self.core.name)))?;

        info!(
            worker = %self.core.name,
            processed = self.core.counters.processed.load(Ordering::Relaxed),
            failed = self.core.counters.failed.load(Ordering::Relaxed),
            "Worker closed"
        );
        Ok(())
    }

    fn status(&self) -> WorkerStatus {
        let counters = &self.core.counters;
        WorkerStatus {
            name: self.core.name.clone(),
            running: self.core.running.load(Ordering::Acquire),
            concurrency: self.concurrency,
            in_flight: counters.in_flight.load(Ordering::Acquire),
            processed: counters.processed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            retried: counters.retried.load(Ordering::Relaxed),
        }
    }
}

pub struct QueueWorkerBuilder {
    name: String,
    job_type: JobType,
    source: Arc<dyn JobSource>,
    handler: Arc<dyn JobHandler>,
    broadcaster: Arc<dyn StatusBroadcaster>,
    health: Option<Arc<HealthMonitor>>,
    config: QueueWorkerConfig,
}

impl QueueWorkerBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn StatusBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Pause polling while the monitor reports Unhealthy
    pub fn health_gate(mut self, health: Arc<HealthMonitor>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn config(mut self, config: QueueWorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the poll loop on the current runtime
    pub fn spawn(self) -> Arc<QueueWorker> {
        let concurrency = self.config.concurrency.max(1);
        let core = Arc::new(WorkerCore {
            name: self.name,
            job_type: self.job_type,
            source: self.source,
            handler: self.handler,
            broadcaster: self.broadcaster,
            health: self.health,
            retry: RetryExecutor::new(self.config.retry),
            poll_interval: self.config.poll_interval,
            permits: Arc::new(Semaphore::new(concurrency)),
            running: AtomicBool::new(true),
            shutdown: Notify::new(),
            counters: WorkerCounters::default(),
        });

        let poll_task = tokio::spawn(Arc::clone(&core).poll_loop());
        Arc::new(QueueWorker {
            core,
            concurrency,
            closed: AtomicBool::new(false),
            poll_task: Mutex::new(Some(poll_task)),
        })
    }
}

/// Factory that builds a [`QueueWorker`] around a job handler
#[derive(Clone)]
pub struct QueueWorkerFactory {
    job_type: JobType,
    handler: Arc<dyn JobHandler>,
}

impl QueueWorkerFactory {
    pub fn new(job_type: JobType, handler: Arc<dyn JobHandler>) -> Self {
        Self { job_type, handler }
    }
}

#[async_trait]
impl WorkerFactory<dyn JobSource, ServiceContext> for QueueWorkerFactory {
    async fn create(
        &self,
        queue: Arc<dyn JobSource>,
        context: &ServiceContext,
    ) -> anyhow::Result<Arc<dyn WorkerHandle>> {
        let worker = QueueWorker::builder(self.job_type, queue, Arc::clone(&self.handler))
            .broadcaster(Arc::clone(&context.broadcaster))
            .health_gate(Arc::clone(&context.health))
            .config(QueueWorkerConfig::from(&context.config))
            .spawn();
        Ok(worker)
    }
}
