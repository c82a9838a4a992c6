//! # Import System
//!
//! Composition root for the reliability layer. Owns the one [`HealthMonitor`]
//! instance, the worker lifecycle manager and the created worker map, and
//! optionally the bulk ingestion processor.
//!
//! ```rust,no_run
//! use importer_core::system::{ImportSystem, ServiceContext};
//! use importer_core::workers::WorkerDescriptor;
//! # use importer_core::workers::JobSource;
//!
//! # async fn example(context: ServiceContext, descriptors: Vec<WorkerDescriptor<dyn JobSource, ServiceContext>>) -> importer_core::Result<()> {
//! let system = ImportSystem::new(context);
//! system.start(descriptors.as_slice()).await?;
//!
//! // per request
//! system.admit().await?;
//!
//! let report = system.shutdown().await;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ImporterConfig;
use crate::error::{ImporterError, Result};
use crate::health::{HealthMonitor, ServiceHealth};
use crate::ingestion::{FileProcessingStats, StreamingIngestionProcessor};
use crate::workers::{
    NamedWorkerStatus, NoopBroadcaster, ShutdownReport, StatusBroadcaster, WorkerDescriptor,
    WorkerLifecycleEvent, WorkerLifecycleManager, WorkerMap,
};

/// Shared context handed to every worker factory
#[derive(Clone)]
pub struct ServiceContext {
    pub health: Arc<HealthMonitor>,
    pub broadcaster: Arc<dyn StatusBroadcaster>,
    pub config: ImporterConfig,
}

impl ServiceContext {
    pub fn new(health: Arc<HealthMonitor>, config: ImporterConfig) -> Self {
        Self {
            health,
            broadcaster: Arc::new(NoopBroadcaster),
            config,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn StatusBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("health", &self.health)
            .field("config", &self.config)
            .finish()
    }
}

pub struct ImportSystem {
    context: ServiceContext,
    lifecycle: WorkerLifecycleManager,
    workers: Mutex<WorkerMap>,
    started: AtomicBool,
    ingestion: Option<Arc<StreamingIngestionProcessor>>,
}

impl ImportSystem {
    pub fn new(context: ServiceContext) -> Self {
        let lifecycle = WorkerLifecycleManager::from_config(&context.config.workers);
        Self {
            context,
            lifecycle,
            workers: Mutex::new(WorkerMap::new()),
            started: AtomicBool::new(false),
            ingestion: None,
        }
    }

    pub fn with_ingestion(mut self, processor: Arc<StreamingIngestionProcessor>) -> Self {
        self.ingestion = Some(processor);
        self
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.context.health
    }

    /// Create every worker. All-or-nothing; may only succeed once.
    pub async fn start<Q>(&self, descriptors: &[WorkerDescriptor<Q, ServiceContext>]) -> Result<usize>
    where
        Q: ?Sized + Send + Sync,
    {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ImporterError::Worker("import system already started".to_string()));
        }

        match self.lifecycle.create_all(descriptors, &self.context).await {
            Ok(created) => {
                let count = created.len();
                *self.workers.lock() = created;
                info!(workers = count, "🚀 Import system started");
                Ok(count)
            }
            Err(error) => {
                self.started.store(false, Ordering::Release);
                Err(error)
            }
        }
    }

    /// Admission gate: `ServiceUnavailable` while the service is Unhealthy
    pub async fn admit(&self) -> Result<ServiceHealth> {
        let health = self.context.health.get_health().await;
        if health.is_serviceable() {
            Ok(health)
        } else {
            warn!(status = %health.status, "Rejecting work while unhealthy");
            Err(ImporterError::ServiceUnavailable(format!(
                "service is {}",
                health.status
            )))
        }
    }

    /// Admission-gated bulk ingestion
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<FileProcessingStats> {
        self.admit().await?;
        let processor = self.ingestion.as_ref().ok_or_else(|| {
            ImporterError::ServiceUnavailable("bulk ingestion is not configured".to_string())
        })?;
        processor.process_files(paths).await
    }

    pub fn status(&self) -> Vec<NamedWorkerStatus> {
        let workers = self.workers.lock();
        self.lifecycle.status_of(&workers)
    }

    pub fn lifecycle_events(&self) -> Vec<WorkerLifecycleEvent> {
        self.lifecycle.events()
    }

    /// Close every worker and drain ingestion. Best-effort, never fails.
    pub async fn shutdown(&self) -> ShutdownReport {
        let workers = std::mem::take(&mut *self.workers.lock());
        info!(workers = workers.len(), "Shutting down import system");

        let drain_ingestion = async {
            if let Some(processor) = &self.ingestion {
                processor.shutdown().await;
            }
        };
        let (report, ()) = tokio::join!(self.lifecycle.close_all(&workers), drain_ingestion);
        report
    }
}
