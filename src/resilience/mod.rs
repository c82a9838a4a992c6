//! # Resilience Module
//!
//! Error classification and retry policy shared by workers, health probes and
//! the ingestion pipeline. Everything here is stateless and safe to call from
//! any number of tasks concurrently.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use importer_core::resilience::{classify, should_retry, backoff_delay, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let error = classify("connect ECONNREFUSED 10.0.0.7:6379");
//!
//! if should_retry(&error, 1, &policy) {
//!     println!("retrying in {:?}", backoff_delay(0, &policy));
//! }
//! ```

pub mod error_classifier;
pub mod retry;

pub use error_classifier::{
    classify, ErrorClassifier, ErrorKind, HeuristicErrorClassifier, Severity, TypedError,
};
pub use retry::{
    backoff_delay, retry_with_backoff, should_retry, with_error_handling, RetryExecutor,
    RetryPolicy,
};
