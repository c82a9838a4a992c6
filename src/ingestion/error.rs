//! Ingestion failure types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::error::ImporterError;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("received an empty chunk")]
    EmptyChunk,

    #[error("content exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("content is empty")]
    EmptyContent,

    #[error("content does not contain a recognized document marker")]
    MissingMarker,
}

impl IngestionError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<IngestionError> for ImporterError {
    fn from(error: IngestionError) -> Self {
        match error {
            IngestionError::Io { source, .. } => ImporterError::Io(source),
            other => ImporterError::Validation(other.to_string()),
        }
    }
}

pub type IngestionResult<T> = std::result::Result<T, IngestionError>;
