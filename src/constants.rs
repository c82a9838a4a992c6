//! # System Constants
//!
//! Default values shared by configuration, the health monitor, the retry policy
//! and the ingestion processor.

/// Retry policy defaults
pub mod retry {
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BASE_DELAY_MS: u64 = 1_000;
    pub const MAX_DELAY_MS: u64 = 30_000;
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
    /// Zero keeps backoff deterministic
    pub const JITTER_FACTOR: f64 = 0.0;
}

/// Health monitoring defaults
pub mod health {
    pub const CACHE_TTL_MS: u64 = 30_000;
    pub const PROBE_TIMEOUT_MS: u64 = 5_000;
    /// Round trips at or above this latency report Degraded
    pub const DEGRADED_LATENCY_MS: u64 = 500;
    pub const MAX_WAITING_JOBS: u64 = 1_000;
    pub const MAX_FAILED_JOBS: u64 = 100;
    pub const CACHE_PROBE_KEY: &str = "importer:health:probe";

    /// Latency upper bounds (exclusive, ms) and the score awarded below each
    pub const PERFORMANCE_SCORE_STEPS: [(u64, u8); 5] =
        [(100, 100), (500, 90), (1_000, 75), (2_000, 50), (5_000, 25)];
}

/// Worker defaults
pub mod workers {
    pub const CONCURRENCY: usize = 2;
    pub const POLL_INTERVAL_MS: u64 = 1_000;
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 30_000;
    pub const EVENT_LOG_CAPACITY: usize = 1_024;
}

/// Ingestion defaults
pub mod ingestion {
    pub const MAX_CONCURRENT_FILES: usize = 5;
    pub const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;
    pub const CHUNK_SIZE_BYTES: usize = 64 * 1024;
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
    pub const CACHE_TTL_MS: u64 = 60 * 60 * 1_000;
    pub const TEMP_DIR: &str = "tmp/ingestion";
    pub const DOCUMENT_MARKERS: [&str; 5] = ["<html", "<body", "<en-note", "<div", "<p"];
}

/// Error codes attached to unhealthy checks
pub mod error_codes {
    pub const DATABASE_UNAVAILABLE: &str = "DATABASE_UNAVAILABLE";
    pub const CACHE_UNAVAILABLE: &str = "CACHE_UNAVAILABLE";
    pub const CACHE_NOT_READY: &str = "CACHE_NOT_READY";
    pub const QUEUE_UNAVAILABLE: &str = "QUEUE_UNAVAILABLE";
    pub const PROBE_TIMEOUT: &str = "PROBE_TIMEOUT";
}
