//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration from {source_name}: {reason}")]
    LoadFailed { source_name: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid worker descriptor '{worker}': {reason}")]
    InvalidWorkerDescriptor { worker: String, reason: String },

    #[error("Duplicate worker registered for job type '{job_type}'")]
    DuplicateWorker { job_type: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_descriptor(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidWorkerDescriptor {
            worker: worker.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        Self::LoadFailed {
            source_name: "config".to_string(),
            reason: error.to_string(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;
