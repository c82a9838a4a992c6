//! # Error Classification
//!
//! Turns arbitrary failures into [`TypedError`]s carrying a kind and a severity
//! so that retry decisions and logging are uniform across workers, probes and
//! the ingestion pipeline.
//!
//! ## Heuristic
//!
//! Errors that are already typed ([`ImporterError`] variants) classify
//! structurally. Everything else is classified by scanning the lower-cased
//! message for substring markers, first match wins:
//!
//! | markers                                            | kind            | severity |
//! |----------------------------------------------------|-----------------|----------|
//! | `database`, `prisma`, `sqlx`, `sql`, `postgres`    | Database        | High     |
//! | `redis`, `connection`                              | CacheBackend    | High     |
//! | `network`, `econnrefused`                          | Network         | Medium   |
//! | `timeout`, `timed out`                             | Timeout         | Medium   |
//! | `api`, `service`, `http`                           | ExternalService | Medium   |
//! | anything else                                      | Unknown         | Medium   |
//!
//! This is best-effort only. Ambiguous messages fall through to `Unknown`, and
//! the table can be replaced by structured upstream codes by providing another
//! [`ErrorClassifier`] implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ImporterError;

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Database,
    CacheBackend,
    Network,
    Timeout,
    ExternalService,
    Worker,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Database => "database",
            ErrorKind::CacheBackend => "cache_backend",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ExternalService => "external_service",
            ErrorKind::Worker => "worker",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Severity, ordered `Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    /// Non-recoverable; never retried
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// A failure after classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}/{severity}] {message}")]
pub struct TypedError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    pub context: HashMap<String, serde_json::Value>,
    /// Rendered chain of the raw error this was classified from
    pub original_cause: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TypedError {
    pub fn new(kind: ErrorKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            context: HashMap::new(),
            original_cause: None,
            timestamp: Utc::now(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, Severity::Low, message)
    }

    pub fn critical(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Critical, message)
    }

    /// Add context before logging; outer handlers may enrich, never overwrite kind
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.original_cause = Some(cause.into());
        self
    }

    /// Whether the kind and severity permit a retry at all
    pub fn is_recoverable(&self) -> bool {
        self.kind != ErrorKind::Validation && self.severity != Severity::Critical
    }
}

/// Strategy for turning failures into typed errors
pub trait ErrorClassifier: Send + Sync {
    /// Classify a raw failure message
    fn classify_message(&self, message: &str) -> TypedError;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;

    /// Classify a crate error, using its variant when it carries one
    fn classify_error(&self, error: &ImporterError) -> TypedError {
        let message = error.to_string();
        let cause = message.clone();
        let typed = match error {
            ImporterError::Queue(typed) => return typed.clone(),
            ImporterError::Validation(_) => TypedError::validation(message),
            ImporterError::Configuration(_) => {
                TypedError::critical(ErrorKind::Validation, message)
            }
            ImporterError::Database(_) => {
                TypedError::new(ErrorKind::Database, Severity::High, message)
            }
            ImporterError::CacheBackend(_) => {
                TypedError::new(ErrorKind::CacheBackend, Severity::High, message)
            }
            ImporterError::Network(_) => {
                TypedError::new(ErrorKind::Network, Severity::Medium, message)
            }
            ImporterError::Timeout(_) => {
                TypedError::new(ErrorKind::Timeout, Severity::Medium, message)
            }
            ImporterError::ExternalService(_) | ImporterError::ServiceUnavailable(_) => {
                TypedError::new(ErrorKind::ExternalService, Severity::Medium, message)
            }
            ImporterError::Worker(_) => TypedError::new(ErrorKind::Worker, Severity::High, message),
            ImporterError::ShutdownInProgress => TypedError::critical(ErrorKind::Worker, message),
            ImporterError::Other(inner) => match inner.downcast_ref::<ImporterError>() {
                Some(nested) => return self.classify_error(nested),
                None => return self.classify_message(&format!("{inner:#}")),
            },
            ImporterError::Io(_) => return self.classify_message(&message),
        };
        typed.with_cause(cause)
    }
}

/// Substring marker table, checked in order
const MARKERS: &[(&[&str], ErrorKind, Severity)] = &[
    (
        &["database", "prisma", "sqlx", "sql", "postgres"],
        ErrorKind::Database,
        Severity::High,
    ),
    (
        &["redis", "connection"],
        ErrorKind::CacheBackend,
        Severity::High,
    ),
    (
        &["network", "econnrefused"],
        ErrorKind::Network,
        Severity::Medium,
    ),
    (&["timeout", "timed out"], ErrorKind::Timeout, Severity::Medium),
    (
        &["api", "service", "http"],
        ErrorKind::ExternalService,
        Severity::Medium,
    ),
];

/// Default substring-marker classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicErrorClassifier;

impl ErrorClassifier for HeuristicErrorClassifier {
    fn classify_message(&self, message: &str) -> TypedError {
        let lowered = message.to_lowercase();
        let (kind, severity) = MARKERS
            .iter()
            .find(|(markers, _, _)| markers.iter().any(|marker| lowered.contains(marker)))
            .map(|(_, kind, severity)| (*kind, *severity))
            .unwrap_or((ErrorKind::Unknown, Severity::Medium));

        TypedError::new(kind, severity, message).with_cause(message)
    }

    fn classifier_name(&self) -> &'static str {
        "HeuristicErrorClassifier"
    }
}

/// Classify any displayable failure with the default classifier.
///
/// The alternate form is used so `anyhow` chains contribute every cause.
pub fn classify<E: fmt::Display + ?Sized>(raw: &E) -> TypedError {
    HeuristicErrorClassifier.classify_message(&format!("{raw:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(message: &str) -> (ErrorKind, Severity) {
        let typed = classify(message);
        (typed.kind, typed.severity)
    }

    #[test]
    fn test_database_markers() {
        assert_eq!(kind_of("Database is locked"), (ErrorKind::Database, Severity::High));
        assert_eq!(kind_of("PrismaClientKnownRequestError"), (ErrorKind::Database, Severity::High));
        assert_eq!(kind_of("SQL syntax error near FROM"), (ErrorKind::Database, Severity::High));
    }

    #[test]
    fn test_cache_backend_markers() {
        assert_eq!(kind_of("Redis is loading the dataset"), (ErrorKind::CacheBackend, Severity::High));
        assert_eq!(kind_of("connection reset by peer"), (ErrorKind::CacheBackend, Severity::High));
    }

    #[test]
    fn test_network_timeout_and_external_markers() {
        assert_eq!(kind_of("network unreachable"), (ErrorKind::Network, Severity::Medium));
        assert_eq!(kind_of("connect ECONNREFUSED 127.0.0.1"), (ErrorKind::Network, Severity::Medium));
        assert_eq!(kind_of("operation timed out"), (ErrorKind::Timeout, Severity::Medium));
        assert_eq!(kind_of("HTTP 502 from upstream"), (ErrorKind::ExternalService, Severity::Medium));
    }

    #[test]
    fn test_first_marker_wins() {
        // "database" is checked before "connection"
        assert_eq!(kind_of("database connection lost"), (ErrorKind::Database, Severity::High));
    }

    #[test]
    fn test_unmatched_message_falls_back_to_unknown() {
        let typed = classify("something odd happened");
        assert_eq!(typed.kind, ErrorKind::Unknown);
        assert_eq!(typed.severity, Severity::Medium);
        assert_eq!(typed.original_cause.as_deref(), Some("something odd happened"));
    }

    #[test]
    fn test_structural_classification_ignores_message_markers() {
        let error = ImporterError::Validation("database field missing".to_string());
        let typed = HeuristicErrorClassifier.classify_error(&error);
        assert_eq!(typed.kind, ErrorKind::Validation);
        assert!(!typed.is_recoverable());
    }

    #[test]
    fn test_structural_classification_keeps_rendered_cause() {
        let error = ImporterError::Database("pool exhausted".to_string());
        let typed = HeuristicErrorClassifier.classify_error(&error);
        assert_eq!(typed.kind, ErrorKind::Database);
        assert_eq!(typed.severity, Severity::High);
        assert_eq!(typed.message, error.to_string());
        assert_eq!(typed.original_cause, Some(error.to_string()));
    }

    #[test]
    fn test_queue_error_is_returned_unchanged() {
        let original = TypedError::new(ErrorKind::Network, Severity::Medium, "flaky")
            .with_context("job_id", "42");
        let typed = HeuristicErrorClassifier.classify_error(&ImporterError::Queue(original.clone()));
        assert_eq!(typed, original);
    }

    #[test]
    fn test_anyhow_chain_contributes_causes() {
        let err = anyhow::anyhow!("redis GET failed").context("loading cached result");
        let typed = classify(&err);
        assert_eq!(typed.kind, ErrorKind::CacheBackend);
        assert!(typed.message.contains("loading cached result"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }
}
