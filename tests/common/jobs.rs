//! Job source, handler and broadcaster doubles for queue worker tests

use async_trait::async_trait;
use importer_core::resilience::TypedError;
use importer_core::workers::{Job, JobHandler, JobSource, JobStatusUpdate, StatusBroadcaster};
use importer_core::ImporterError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct InMemoryJobSource {
    pending: Mutex<VecDeque<Job>>,
    completed: Mutex<Vec<String>>,
    failed: Mutex<Vec<(String, TypedError)>>,
}

impl InMemoryJobSource {
    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        Self {
            pending: Mutex::new(jobs.into()),
            ..Self::default()
        }
    }

    pub fn push(&self, job: Job) {
        self.pending.lock().push_back(job);
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    pub fn failed(&self) -> Vec<(String, TypedError)> {
        self.failed.lock().clone()
    }
}

#[async_trait]
impl JobSource for InMemoryJobSource {
    async fn next_job(&self) -> anyhow::Result<Option<Job>> {
        Ok(self.pending.lock().pop_front())
    }

    async fn complete(&self, job: &Job) -> anyhow::Result<()> {
        self.completed.lock().push(job.id.clone());
        Ok(())
    }

    async fn fail(&self, job: &Job, error: &TypedError) -> anyhow::Result<()> {
        self.failed.lock().push((job.id.clone(), error.clone()));
        Ok(())
    }
}

/// How a scripted handler treats one job
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    /// Fail with a network error this many times, then succeed
    FlakyNetwork(u32),
    RejectInput,
    /// Take this long, then succeed
    Slow(Duration),
}

#[derive(Debug, Default)]
pub struct ScriptedHandler {
    scripts: HashMap<String, Script>,
    pub calls: AtomicUsize,
    pub running: AtomicUsize,
    pub max_running: AtomicUsize,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, job: &Job, script: Script) -> Self {
        self.scripts.insert(job.id.clone(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobHandler for ScriptedHandler {
    async fn handle(&self, job: &Job, attempt: u32) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        let outcome = match self.scripts.get(&job.id).cloned().unwrap_or(Script::Succeed) {
            Script::Succeed => Ok(()),
            Script::FlakyNetwork(failures) if attempt <= failures => {
                Err(ImporterError::Network(format!("socket hang up on attempt {attempt}")).into())
            }
            Script::FlakyNetwork(_) => Ok(()),
            Script::RejectInput => Err(ImporterError::Validation("note has no title".to_string()).into()),
            Script::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    updates: Mutex<Vec<JobStatusUpdate>>,
}

impl RecordingBroadcaster {
    pub fn updates(&self) -> Vec<JobStatusUpdate> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl StatusBroadcaster for RecordingBroadcaster {
    async fn broadcast(&self, update: &JobStatusUpdate) -> anyhow::Result<()> {
        self.updates.lock().push(update.clone());
        Ok(())
    }
}
