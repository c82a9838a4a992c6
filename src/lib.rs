#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, Redis in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Importer Core
//!
//! Reliability layer behind an asynchronous document-import pipeline.
//!
//! ## Overview
//!
//! An HTTP-facing service enqueues imported documents, a pool of background
//! workers performs multi-stage processing, and this crate keeps that
//! processing resilient to partial failure, overload and flaky dependencies.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Error classification, retry eligibility and backoff
//! - [`health`] - Cached multi-component health aggregation and admission gating
//! - [`workers`] - Worker lifecycle management and the polling queue worker
//! - [`ingestion`] - Streaming, bounded-concurrency bulk file ingestion
//! - [`system`] - Composition root wiring the pieces together
//! - [`config`] - Layered configuration via the `config` crate
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured console and JSON file logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use importer_core::config::ConfigManager;
//! use importer_core::ingestion::{LocalFileSystem, StreamingIngestionProcessor};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! importer_core::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//!
//! let processor = StreamingIngestionProcessor::new(
//!     Arc::new(LocalFileSystem),
//!     manager.config().ingestion.clone(),
//! );
//! let stats = processor
//!     .process_files(&[PathBuf::from("exports/notes.html")])
//!     .await?;
//! println!("{} of {} files imported", stats.processed_files, stats.total_files);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod ingestion;
pub mod logging;
pub mod resilience;
pub mod system;
pub mod workers;

pub use config::{ConfigManager, ConfigurationError, ImporterConfig};
pub use error::{ErrorResponse, ImporterError, Result};
pub use health::{HealthCheck, HealthMonitor, HealthStatus, ServiceHealth};
pub use ingestion::{FileProcessingResult, FileProcessingStats, StreamingIngestionProcessor};
pub use resilience::{classify, ErrorKind, RetryPolicy, Severity, TypedError};
pub use system::{ImportSystem, ServiceContext};
pub use workers::{JobType, WorkerHandle, WorkerLifecycleManager};
