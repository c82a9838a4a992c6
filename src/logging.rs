//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to the console and to a
//! JSON log file, plus helpers that give the core's lifecycle, health and
//! ingestion events a consistent field layout.

use chrono::Utc;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::health::HealthCheck;
use crate::ingestion::{FileProcessingResult, FileStatus};
use crate::resilience::TypedError;
use crate::workers::WorkerLifecycleEvent;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();
static FILE_WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize structured logging writing files under `./log`
pub fn init_structured_logging() {
    init_structured_logging_in(Path::new("log"));
}

/// Initialize structured logging writing files under `log_dir`.
///
/// Safe to call repeatedly and alongside an already-installed global
/// subscriber; only the first call has any effect.
pub fn init_structured_logging_in(log_dir: &Path) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");

        let file_layer = match fs::create_dir_all(log_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::never(log_dir, &log_filename);
                let (file_writer, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_WRITER_GUARD.set(guard);
                Some(
                    fmt::layer()
                        .with_writer(file_writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(build_filter(&log_level)),
                )
            }
            Err(_) => None,
        };

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(build_filter(&log_level)),
            )
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_dir.join(&log_filename).display(),
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("IMPORTER_LOG").unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("IMPORTER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a worker lifecycle event
pub fn log_worker_event(event: &WorkerLifecycleEvent) {
    match event {
        WorkerLifecycleEvent::WorkerStarted { name } => {
            tracing::info!(worker = %name, event = "worker_started", "🚀 WORKER_STARTED");
        }
        WorkerLifecycleEvent::WorkerFailed { name, error } => {
            tracing::error!(worker = %name, error = %error, event = "worker_failed", "❌ WORKER_FAILED");
        }
        WorkerLifecycleEvent::WorkerClosed { name } => {
            tracing::info!(worker = %name, event = "worker_closed", "🛑 WORKER_CLOSED");
        }
        WorkerLifecycleEvent::WorkerError { name, error } => {
            tracing::warn!(worker = %name, error = %error, event = "worker_error", "⚠️ WORKER_ERROR");
        }
    }
}

/// Log a single component health check outcome
pub fn log_health_check(component: &str, check: &HealthCheck) {
    match check {
        HealthCheck::Healthy {
            response_time_ms,
            performance_score,
        } => tracing::debug!(
            component = component,
            response_time_ms = response_time_ms,
            performance_score = performance_score,
            "💚 HEALTH_CHECK"
        ),
        HealthCheck::Degraded {
            response_time_ms,
            performance_score,
            warnings,
        } => tracing::warn!(
            component = component,
            response_time_ms = response_time_ms,
            performance_score = performance_score,
            warnings = ?warnings,
            "💛 HEALTH_CHECK degraded"
        ),
        HealthCheck::Unhealthy {
            error,
            error_code,
            critical,
        } => tracing::error!(
            component = component,
            error = %error,
            error_code = %error_code,
            critical = critical,
            "💔 HEALTH_CHECK unhealthy"
        ),
    }
}

/// Log a classified error with its full context
pub fn log_classified_error(operation: &str, error: &TypedError) {
    let context = serde_json::to_string(&error.context).unwrap_or_default();
    tracing::error!(
        operation = %operation,
        kind = %error.kind,
        severity = %error.severity,
        message = %error.message,
        cause = error.original_cause.as_deref(),
        context = %context,
        timestamp = %error.timestamp.to_rfc3339(),
        "🧯 CLASSIFIED_ERROR"
    );
}

/// Log the outcome for one ingested file
pub fn log_file_processed(result: &FileProcessingResult) {
    match result.status {
        FileStatus::Success => tracing::info!(
            file = %result.name,
            size_bytes = result.size_bytes,
            processing_time_ms = result.processing_time_ms,
            derived_id = result.derived_id.as_deref(),
            "📄 FILE_PROCESSED"
        ),
        FileStatus::Failed => tracing::warn!(
            file = %result.name,
            size_bytes = result.size_bytes,
            error = result.error.as_deref(),
            "📄 FILE_FAILED"
        ),
        FileStatus::Skipped => tracing::info!(
            file = %result.name,
            size_bytes = result.size_bytes,
            reason = result.error.as_deref(),
            "📄 FILE_SKIPPED"
        ),
    }
}
