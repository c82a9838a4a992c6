//! # Bulk Ingestion
//!
//! Streaming, bounded-concurrency ingestion of candidate document files behind
//! the synchronous bulk-import entry point.

pub mod cache;
pub mod error;
pub mod fs;
pub mod processor;
pub mod transform;
pub mod types;

pub use cache::{cache_key, InMemoryResultCache, ResultCache};
pub use error::{IngestionError, IngestionResult};
pub use fs::{BoxedReader, BoxedWriter, FileSystem, LocalFileSystem};
pub use processor::{IngestionEvent, StreamingIngestionProcessor};
pub use transform::{check_content, normalize, ChunkValidator, Normalizer};
pub use types::{FileProcessingResult, FileProcessingStats, FileStatus};
