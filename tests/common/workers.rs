//! Worker and factory doubles for lifecycle tests

use async_trait::async_trait;
use importer_core::workers::{WorkerFactory, WorkerHandle, WorkerStatus};
use importer_core::{ImporterError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Stand-in queue handle
#[derive(Debug, Default)]
pub struct MockQueue;

#[derive(Debug)]
pub struct MockWorker {
    pub name: String,
    closes: AtomicUsize,
    close_failure: Option<String>,
    close_delay: Duration,
}

impl MockWorker {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            closes: AtomicUsize::new(0),
            close_failure: None,
            close_delay: Duration::ZERO,
        })
    }

    pub fn failing_close(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            closes: AtomicUsize::new(0),
            close_failure: Some(message.to_string()),
            close_delay: Duration::ZERO,
        })
    }

    pub fn slow_close(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            closes: AtomicUsize::new(0),
            close_failure: None,
            close_delay: delay,
        })
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerHandle for MockWorker {
    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        match &self.close_failure {
            Some(message) => Err(ImporterError::Worker(message.clone())),
            None => Ok(()),
        }
    }

    fn status(&self) -> WorkerStatus {
        WorkerStatus {
            name: self.name.clone(),
            running: self.closes() == 0,
            concurrency: 1,
            in_flight: 0,
            processed: 0,
            failed: 0,
            retried: 0,
        }
    }
}

/// Factory returning a prepared worker, or failing
#[derive(Debug)]
pub struct MockFactory {
    worker: Option<Arc<MockWorker>>,
    calls: AtomicUsize,
}

impl MockFactory {
    pub fn returning(worker: Arc<MockWorker>) -> Arc<Self> {
        Arc::new(Self {
            worker: Some(worker),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            worker: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Send + Sync> WorkerFactory<MockQueue, C> for MockFactory {
    async fn create(&self, _queue: Arc<MockQueue>, _context: &C) -> anyhow::Result<Arc<dyn WorkerHandle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.worker {
            Some(worker) => Ok(worker.clone()),
            None => Err(anyhow::anyhow!("queue registration rejected")),
        }
    }
}
