//! Job types and the capability traits every worker implementation provides.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ConfigurationError;

/// Closed set of background job types, one worker per type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    NoteProcessing,
    IngredientProcessing,
    InstructionProcessing,
    ImageProcessing,
    Categorization,
    SourceProcessing,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::NoteProcessing,
        JobType::IngredientProcessing,
        JobType::InstructionProcessing,
        JobType::ImageProcessing,
        JobType::Categorization,
        JobType::SourceProcessing,
    ];

    /// Stable name used for logging, queue naming and serialization
    pub fn name(&self) -> &'static str {
        match self {
            JobType::NoteProcessing => "note-processing",
            JobType::IngredientProcessing => "ingredient-processing",
            JobType::InstructionProcessing => "instruction-processing",
            JobType::ImageProcessing => "image-processing",
            JobType::Categorization => "categorization",
            JobType::SourceProcessing => "source-processing",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|job_type| job_type.name() == s)
            .ok_or_else(|| ConfigurationError::invalid_value("job_type", format!("unknown job type '{s}'")))
    }
}

/// Point-in-time snapshot of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub name: String,
    pub running: bool,
    pub concurrency: usize,
    pub in_flight: usize,
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
}

/// Opaque handle the lifecycle manager owns for each created worker
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    /// Stop accepting jobs and wait for in-flight work
    async fn close(&self) -> crate::Result<()>;

    fn status(&self) -> WorkerStatus;
}

/// Builds the worker for one job type from its queue and the shared context
#[async_trait]
pub trait WorkerFactory<Q: ?Sized, C>: Send + Sync {
    async fn create(&self, queue: Arc<Q>, context: &C) -> anyhow::Result<Arc<dyn WorkerHandle>>;
}
