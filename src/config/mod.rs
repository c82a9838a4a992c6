//! # Importer Configuration
//!
//! Typed configuration for the reliability layer. Every section has defaults so
//! an empty configuration file (or none at all) yields a working setup; files
//! and environment variables only override what they name.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use importer_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let retry = manager.config().retry.policy();
//! println!("max attempts: {}", retry.max_attempts);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::resilience::RetryPolicy;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,

    /// Retry and backoff settings shared by every worker
    pub retry: RetryConfig,

    /// Health monitor cache and thresholds
    pub health: HealthConfig,

    /// Worker pool settings
    pub workers: WorkerConfig,

    /// Bulk ingestion settings
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of the computed delay added as random jitter (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::retry::MAX_ATTEMPTS,
            base_delay_ms: constants::retry::BASE_DELAY_MS,
            max_delay_ms: constants::retry::MAX_DELAY_MS,
            backoff_multiplier: constants::retry::BACKOFF_MULTIPLIER,
            jitter_factor: constants::retry::JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    pub cache_ttl_ms: u64,
    pub probe_timeout_ms: u64,
    pub degraded_latency_ms: u64,
    pub max_waiting_jobs: u64,
    pub max_failed_jobs: u64,
    /// Key read by the cache backend round-trip probe
    pub cache_probe_key: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: constants::health::CACHE_TTL_MS,
            probe_timeout_ms: constants::health::PROBE_TIMEOUT_MS,
            degraded_latency_ms: constants::health::DEGRADED_LATENCY_MS,
            max_waiting_jobs: constants::health::MAX_WAITING_JOBS,
            max_failed_jobs: constants::health::MAX_FAILED_JOBS,
            cache_probe_key: constants::health::CACHE_PROBE_KEY.to_string(),
        }
    }
}

impl HealthConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn degraded_latency(&self) -> Duration {
        Duration::from_millis(self.degraded_latency_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Concurrent job executions per worker
    pub concurrency: usize,
    /// Idle wait between polls of an empty queue
    pub poll_interval_ms: u64,
    /// Upper bound on a single worker's close during shutdown
    pub shutdown_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: constants::workers::CONCURRENCY,
            poll_interval_ms: constants::workers::POLL_INTERVAL_MS,
            shutdown_timeout_ms: constants::workers::SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Batch size; also the ceiling on concurrently open files
    pub max_concurrent_files: usize,
    pub max_file_size_bytes: u64,
    pub chunk_size_bytes: usize,
    pub enable_cache: bool,
    pub cache_ttl_ms: u64,
    /// Working directory for normalized temp output
    pub temp_dir: PathBuf,
    /// Case-insensitive substrings, at least one of which a document must contain
    pub document_markers: Vec<String>,
    pub event_channel_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: constants::ingestion::MAX_CONCURRENT_FILES,
            max_file_size_bytes: constants::ingestion::MAX_FILE_SIZE_BYTES,
            chunk_size_bytes: constants::ingestion::CHUNK_SIZE_BYTES,
            enable_cache: true,
            cache_ttl_ms: constants::ingestion::CACHE_TTL_MS,
            temp_dir: PathBuf::from(constants::ingestion::TEMP_DIR),
            document_markers: constants::ingestion::DOCUMENT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
            event_channel_capacity: constants::ingestion::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl IngestionConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

impl ImporterConfig {
    /// Reject values that would make a component misbehave at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if retry.max_delay_ms < retry.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_ms",
                format!(
                    "{} is below retry.base_delay_ms ({})",
                    retry.max_delay_ms, retry.base_delay_ms
                ),
            ));
        }
        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                "must be a finite number >= 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&retry.jitter_factor) {
            return Err(ConfigurationError::invalid_value(
                "retry.jitter_factor",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.health.cache_ttl_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "health.cache_ttl_ms",
                "must be greater than zero",
            ));
        }
        if self.health.probe_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "health.probe_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.workers.concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "workers.concurrency",
                "must be at least 1",
            ));
        }

        let ingestion = &self.ingestion;
        if ingestion.max_concurrent_files == 0 {
            return Err(ConfigurationError::invalid_value(
                "ingestion.max_concurrent_files",
                "must be at least 1",
            ));
        }
        if ingestion.chunk_size_bytes == 0 {
            return Err(ConfigurationError::invalid_value(
                "ingestion.chunk_size_bytes",
                "must be at least 1",
            ));
        }
        if ingestion.event_channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "ingestion.event_channel_capacity",
                "must be at least 1",
            ));
        }
        if ingestion.document_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                "ingestion.document_markers",
                "at least one non-empty marker is required",
            ));
        }

        Ok(())
    }
}
