//! # Worker Lifecycle Manager
//!
//! Validates worker descriptors, creates one worker per job type and tears the
//! whole set down at shutdown.
//!
//! Creation is all-or-nothing and sequential in input order: factories commonly
//! register side effects that must not race. Shutdown is the opposite: every
//! worker is closed concurrently, each close is bounded by the shutdown
//! timeout, and one failing close never prevents the others from completing.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ConfigResult, ConfigurationError, WorkerConfig};
use crate::constants;
use crate::error::{ImporterError, Result};
use crate::logging::log_worker_event;
use crate::workers::traits::{JobType, WorkerFactory, WorkerHandle, WorkerStatus};

/// Everything needed to create the worker for one job type
pub struct WorkerDescriptor<Q: ?Sized, C> {
    pub job_type: JobType,
    pub name: String,
    pub factory: Option<Arc<dyn WorkerFactory<Q, C>>>,
    pub queue: Option<Arc<Q>>,
}

impl<Q: ?Sized, C> WorkerDescriptor<Q, C> {
    pub fn new(job_type: JobType, factory: Arc<dyn WorkerFactory<Q, C>>, queue: Arc<Q>) -> Self {
        Self {
            job_type,
            name: job_type.name().to_string(),
            factory: Some(factory),
            queue: Some(queue),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn parts(&self) -> ConfigResult<(&Arc<dyn WorkerFactory<Q, C>>, &Arc<Q>)> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::invalid_descriptor(
                self.job_type.name(),
                "worker name must not be empty",
            ));
        }
        let factory = self.factory.as_ref().ok_or_else(|| {
            ConfigurationError::invalid_descriptor(&self.name, "worker factory is missing")
        })?;
        let queue = self.queue.as_ref().ok_or_else(|| {
            ConfigurationError::invalid_descriptor(&self.name, "queue handle is missing")
        })?;
        Ok((factory, queue))
    }
}

impl<Q: ?Sized, C> Clone for WorkerDescriptor<Q, C> {
    fn clone(&self) -> Self {
        Self {
            job_type: self.job_type,
            name: self.name.clone(),
            factory: self.factory.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<Q: ?Sized, C> fmt::Debug for WorkerDescriptor<Q, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerDescriptor")
            .field("job_type", &self.job_type)
            .field("name", &self.name)
            .field("has_factory", &self.factory.is_some())
            .field("has_queue", &self.queue.is_some())
            .finish()
    }
}

/// Lifecycle events, logged and kept in the manager's event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerLifecycleEvent {
    WorkerStarted { name: String },
    WorkerFailed { name: String, error: String },
    WorkerClosed { name: String },
    WorkerError { name: String, error: String },
}

impl WorkerLifecycleEvent {
    pub fn worker_name(&self) -> &str {
        match self {
            WorkerLifecycleEvent::WorkerStarted { name }
            | WorkerLifecycleEvent::WorkerFailed { name, .. }
            | WorkerLifecycleEvent::WorkerClosed { name }
            | WorkerLifecycleEvent::WorkerError { name, .. } => name,
        }
    }
}

/// A created worker and the descriptor name it was created under
#[derive(Clone)]
pub struct RegisteredWorker {
    pub name: String,
    pub handle: Arc<dyn WorkerHandle>,
}

impl fmt::Debug for RegisteredWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredWorker")
            .field("name", &self.name)
            .finish()
    }
}

/// Created workers keyed by job type
pub type WorkerMap = BTreeMap<JobType, RegisteredWorker>;

/// Outcome of [`WorkerLifecycleManager::close_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub closed: Vec<String>,
    /// `(worker name, error)` for every close that failed or timed out
    pub failed: Vec<(String, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Status of one worker, labelled with its job type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedWorkerStatus {
    pub job_type: JobType,
    pub status: WorkerStatus,
}

#[derive(Debug)]
pub struct WorkerLifecycleManager {
    shutdown_timeout: Duration,
    event_capacity: usize,
    events: Mutex<VecDeque<WorkerLifecycleEvent>>,
}

impl Default for WorkerLifecycleManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(constants::workers::SHUTDOWN_TIMEOUT_MS))
    }
}

impl WorkerLifecycleManager {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            shutdown_timeout,
            event_capacity: constants::workers::EVENT_LOG_CAPACITY,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Keep at most `capacity` events, dropping the oldest first
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.shutdown_timeout())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Reject a descriptor with a blank name, no factory or no queue
    pub fn validate<Q: ?Sized, C>(descriptor: &WorkerDescriptor<Q, C>) -> ConfigResult<()> {
        descriptor.parts().map(|_| ())
    }

    /// Create one worker per descriptor, sequentially in input order.
    ///
    /// Every descriptor is validated and job types are checked for duplicates
    /// before any factory runs. If a factory fails, workers created so far are
    /// closed and the error is returned.
    pub async fn create_all<Q, C>(
        &self,
        descriptors: &[WorkerDescriptor<Q, C>],
        context: &C,
    ) -> Result<WorkerMap>
    where
        Q: ?Sized + Send + Sync,
        C: Send + Sync,
    {
        let mut seen = BTreeSet::new();
        for descriptor in descriptors {
            Self::validate(descriptor)?;
            if !seen.insert(descriptor.job_type) {
                return Err(ConfigurationError::DuplicateWorker {
                    job_type: descriptor.job_type.name().to_string(),
                }
                .into());
            }
        }

        let mut created = WorkerMap::new();
        for descriptor in descriptors {
            let (factory, queue) = descriptor.parts()?;
            debug!(worker = %descriptor.name, job_type = %descriptor.job_type, "Creating worker");

            match factory.create(Arc::clone(queue), context).await {
                Ok(handle) => {
                    self.record(WorkerLifecycleEvent::WorkerStarted {
                        name: descriptor.name.clone(),
                    });
                    created.insert(
                        descriptor.job_type,
                        RegisteredWorker {
                            name: descriptor.name.clone(),
                            handle,
                        },
                    );
                }
                Err(error) => {
                    self.record(WorkerLifecycleEvent::WorkerFailed {
                        name: descriptor.name.clone(),
                        error: format!("{error:#}"),
                    });
                    if !created.is_empty() {
                        warn!(
                            created = created.len(),
                            "Closing workers created before the failure"
                        );
                        self.close_all(&created).await;
                    }
                    return Err(ImporterError::Other(
                        error.context(format!("failed to create worker '{}'", descriptor.name)),
                    ));
                }
            }
        }

        info!(workers = created.len(), "✅ All workers created");
        Ok(created)
    }

    /// Close every worker concurrently and wait for all of them. Never fails.
    pub async fn close_all(&self, workers: &WorkerMap) -> ShutdownReport {
        let timeout = self.shutdown_timeout;
        let closes = workers.values().map(|worker| {
            let name = worker.name.clone();
            let handle = Arc::clone(&worker.handle);
            let task = tokio::spawn(async move { tokio::time::timeout(timeout, handle.close()).await });
            async move { (name, task.await) }
        });
        let outcomes = join_all(closes).await;

        let mut report = ShutdownReport::default();
        for (name, outcome) in outcomes {
            let failure = match outcome {
                Ok(Ok(Ok(()))) => None,
                Ok(Ok(Err(error))) => Some(error.to_string()),
                Ok(Err(_elapsed)) => Some(format!(
                    "close did not finish within {}ms",
                    timeout.as_millis()
                )),
                Err(join_error) => Some(format!("close task failed: {join_error}")),
            };

            match failure {
                None => {
                    self.record(WorkerLifecycleEvent::WorkerClosed { name: name.clone() });
                    report.closed.push(name);
                }
                Some(error) => {
                    self.record(WorkerLifecycleEvent::WorkerError {
                        name: name.clone(),
                        error: error.clone(),
                    });
                    report.failed.push((name, error));
                }
            }
        }

        info!(
            closed = report.closed.len(),
            failed = report.failed.len(),
            "🛑 Worker shutdown complete"
        );
        report
    }

    /// Status of every worker in job-type order
    pub fn status_of(&self, workers: &WorkerMap) -> Vec<NamedWorkerStatus> {
        workers
            .iter()
            .map(|(job_type, worker)| NamedWorkerStatus {
                job_type: *job_type,
                status: worker.handle.status(),
            })
            .collect()
    }

    /// Most recent events, oldest first
    pub fn events(&self) -> Vec<WorkerLifecycleEvent> {
        self.events.lock().iter().cloned().collect()
    }

    fn record(&self, event: WorkerLifecycleEvent) {
        log_worker_event(&event);
        let mut events = self.events.lock();
        if events.len() >= self.event_capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Queue;

    struct StubWorker {
        name: String,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl WorkerHandle for StubWorker {
        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn status(&self) -> WorkerStatus {
            WorkerStatus {
                name: self.name.clone(),
                running: self.closes.load(Ordering::SeqCst) == 0,
                concurrency: 1,
                in_flight: 0,
                processed: 0,
                failed: 0,
                retried: 0,
            }
        }
    }

    struct StubFactory {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl WorkerFactory<Queue, ()> for StubFactory {
        async fn create(&self, _queue: Arc<Queue>, _context: &()) -> anyhow::Result<Arc<dyn WorkerHandle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("queue registration rejected");
            }
            Ok(Arc::new(StubWorker {
                name: "stub".to_string(),
                closes: AtomicUsize::new(0),
            }))
        }
    }

    fn factory(fail: bool) -> Arc<StubFactory> {
        Arc::new(StubFactory {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn descriptor(job_type: JobType, factory: Arc<StubFactory>) -> WorkerDescriptor<Queue, ()> {
        WorkerDescriptor::new(job_type, factory, Arc::new(Queue))
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let d = descriptor(JobType::NoteProcessing, factory(false)).with_name("   ");
        let err = WorkerLifecycleManager::validate(&d).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidWorkerDescriptor { .. }));
    }

    #[test]
    fn test_validate_rejects_missing_factory_and_queue() {
        let mut d = descriptor(JobType::NoteProcessing, factory(false));
        d.factory = None;
        assert!(WorkerLifecycleManager::validate(&d).is_err());

        let mut d = descriptor(JobType::NoteProcessing, factory(false));
        d.queue = None;
        let err = WorkerLifecycleManager::validate(&d).unwrap_err();
        assert!(err.to_string().contains("queue handle is missing"));
    }

    #[test]
    fn test_name_defaults_to_job_type_name() {
        let d = descriptor(JobType::ImageProcessing, factory(false));
        assert_eq!(d.name, "image-processing");
        assert!(WorkerLifecycleManager::validate(&d).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_descriptor_prevents_any_factory_call() {
        let first = factory(false);
        let mut broken = descriptor(JobType::Categorization, factory(false));
        broken.queue = None;
        let descriptors = vec![descriptor(JobType::NoteProcessing, first.clone()), broken];

        let manager = WorkerLifecycleManager::default();
        let result = manager.create_all(&descriptors, &()).await;

        assert!(matches!(result, Err(ImporterError::Configuration(_))));
        assert_eq!(first.calls.load(Ordering::SeqCst), 0);
        assert!(manager.events().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_job_types_are_rejected() {
        let descriptors = vec![
            descriptor(JobType::NoteProcessing, factory(false)),
            descriptor(JobType::NoteProcessing, factory(false)).with_name("notes-2"),
        ];
        let manager = WorkerLifecycleManager::default();
        let result = manager.create_all(&descriptors, &()).await;

        assert!(matches!(
            result,
            Err(ImporterError::Configuration(ConfigurationError::DuplicateWorker { .. }))
        ));
    }

    #[tokio::test]
    async fn test_factory_failure_stops_creation() {
        let third = factory(false);
        let descriptors = vec![
            descriptor(JobType::NoteProcessing, factory(false)),
            descriptor(JobType::IngredientProcessing, factory(true)),
            descriptor(JobType::ImageProcessing, third.clone()),
        ];
        let manager = WorkerLifecycleManager::default();

        let err = manager.create_all(&descriptors, &()).await.unwrap_err();

        assert!(format!("{err:#}").contains("ingredient-processing"));
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
        let events = manager.events();
        assert_eq!(
            events[0],
            WorkerLifecycleEvent::WorkerStarted {
                name: "note-processing".to_string()
            }
        );
        assert!(matches!(
            &events[1],
            WorkerLifecycleEvent::WorkerFailed { name, .. } if name == "ingredient-processing"
        ));
        // rollback close of the first worker
        assert!(matches!(
            &events[2],
            WorkerLifecycleEvent::WorkerClosed { name } if name == "note-processing"
        ));
    }

    #[tokio::test]
    async fn test_status_of_follows_job_type_order() {
        let descriptors = vec![
            descriptor(JobType::SourceProcessing, factory(false)),
            descriptor(JobType::NoteProcessing, factory(false)),
        ];
        let manager = WorkerLifecycleManager::default();
        let workers = manager.create_all(&descriptors, &()).await.unwrap();

        let statuses = manager.status_of(&workers);
        let order: Vec<JobType> = statuses.iter().map(|s| s.job_type).collect();
        assert_eq!(order, vec![JobType::NoteProcessing, JobType::SourceProcessing]);
    }

    #[tokio::test]
    async fn test_event_log_keeps_only_recent_events() {
        let manager = WorkerLifecycleManager::default().with_event_capacity(4);
        for _ in 0..5 {
            let descriptors = vec![descriptor(JobType::NoteProcessing, factory(false))];
            let workers = manager.create_all(&descriptors, &()).await.unwrap();
            manager.close_all(&workers).await;
        }

        let events = manager.events();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[3],
            WorkerLifecycleEvent::WorkerClosed {
                name: "note-processing".to_string()
            }
        );
    }
}
