//! Health probe doubles that count calls and can be made slow or failing

use async_trait::async_trait;
use parking_lot::Mutex;
use importer_core::health::{CacheBackendProbe, QueueProbe, QueueStats, StorageProbe};
use importer_core::resilience::{ErrorClassifier, HeuristicErrorClassifier, TypedError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MockStorage {
    pings: AtomicUsize,
    counts: AtomicUsize,
    latency: Duration,
    failure: Option<String>,
}

impl MockStorage {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(message.to_string()),
            ..Self::default()
        })
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageProbe for MockStorage {
    async fn ping(&self) -> anyhow::Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }

    async fn count(&self) -> anyhow::Result<i64> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        Ok(42)
    }
}

#[derive(Debug)]
pub struct MockCacheBackend {
    ready: AtomicBool,
    gets: AtomicUsize,
    latency: Duration,
    failure: Option<String>,
}

impl Default for MockCacheBackend {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(true),
            gets: AtomicUsize::new(0),
            latency: Duration::ZERO,
            failure: None,
        }
    }
}

impl MockCacheBackend {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(message.to_string()),
            ..Self::default()
        })
    }

    pub fn not_ready() -> Arc<Self> {
        let cache = Self::default();
        cache.ready.store(false, Ordering::SeqCst);
        Arc::new(cache)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackendProbe for MockCacheBackend {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(None),
        }
    }
}

/// Queue probe with fixed per-queue answers; `Err` entries fail the stats call
#[derive(Debug, Default)]
pub struct MockQueues {
    queues: BTreeMap<String, Result<QueueStats, String>>,
    list_failure: Option<String>,
    latency: Duration,
}

impl MockQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue(mut self, name: &str, waiting: u64, failed: u64) -> Self {
        self.queues.insert(
            name.to_string(),
            Ok(QueueStats {
                waiting,
                active: 0,
                failed,
            }),
        );
        self
    }

    pub fn with_broken_queue(mut self, name: &str, message: &str) -> Self {
        self.queues.insert(name.to_string(), Err(message.to_string()));
        self
    }

    pub fn unlistable(message: &str) -> Self {
        Self {
            list_failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Delay applied to the listing and to every stats call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl QueueProbe for MockQueues {
    async fn queue_names(&self) -> anyhow::Result<Vec<String>> {
        self.delay().await;
        match &self.list_failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(self.queues.keys().cloned().collect()),
        }
    }

    async fn stats(&self, queue: &str) -> anyhow::Result<QueueStats> {
        self.delay().await;
        match self.queues.get(queue) {
            Some(Ok(stats)) => Ok(*stats),
            Some(Err(message)) => Err(anyhow::anyhow!("{message}")),
            None => Err(anyhow::anyhow!("unknown queue {queue}")),
        }
    }
}

/// Delegates to the default classifier and records every message it sees
#[derive(Debug, Default)]
pub struct RecordingClassifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingClassifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl ErrorClassifier for RecordingClassifier {
    fn classify_message(&self, message: &str) -> TypedError {
        self.messages.lock().push(message.to_string());
        HeuristicErrorClassifier.classify_message(message)
    }

    fn classifier_name(&self) -> &'static str {
        "RecordingClassifier"
    }
}
