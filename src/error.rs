//! # Error Types
//!
//! Crate-wide error enum and the JSON error body that HTTP handlers built on top
//! of this crate return to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigurationError;
use crate::resilience::{ErrorClassifier, ErrorKind, HeuristicErrorClassifier, TypedError};

#[derive(Debug, Error)]
pub enum ImporterError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Cache backend error: {0}")]
    CacheBackend(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("External service error: {0}")]
    ExternalService(String),
    #[error("Worker error: {0}")]
    Worker(String),
    /// A failure that has already been observed, classified and logged
    #[error("Queue error: {0}")]
    Queue(#[from] TypedError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Shutdown in progress")]
    ShutdownInProgress,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImporterError {
    /// Kind this error classifies to
    pub fn kind(&self) -> ErrorKind {
        HeuristicErrorClassifier.classify_error(self).kind
    }
}

pub type Result<T> = std::result::Result<T, ImporterError>;

/// Error body returned by HTTP handlers: `{"success": false, "message": ..., "kind": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub kind: ErrorKind,
}

impl From<&ImporterError> for ErrorResponse {
    fn from(error: &ImporterError) -> Self {
        let typed = HeuristicErrorClassifier.classify_error(error);
        Self {
            success: false,
            message: typed.message,
            kind: typed.kind,
        }
    }
}

impl From<&TypedError> for ErrorResponse {
    fn from(error: &TypedError) -> Self {
        Self {
            success: false,
            message: error.message.clone(),
            kind: error.kind,
        }
    }
}
