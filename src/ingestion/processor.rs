//! # Streaming Ingestion Processor
//!
//! Bulk ingestion of candidate document files with bounded concurrency.
//!
//! Paths are processed in sequential batches of `max_concurrent_files`; the
//! files of a batch run concurrently and the batch completes only when every
//! file has an outcome. No more than one batch of files is ever open at a time.
//!
//! ## Per-file pipeline
//!
//! ```text
//! stat ─▶ size check ─▶ cache lookup ─▶ stream(validate ─▶ normalize) ─▶ temp file
//!                                                     ─▶ re-read ─▶ content check ─▶ result
//! ```
//!
//! A file never fails the run: every outcome is a [`FileProcessingResult`].
//! Temp files are removed whatever the outcome.

use futures::future::join_all;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::IngestionConfig;
use crate::error::{ImporterError, Result};
use crate::ingestion::cache::{cache_key, ResultCache};
use crate::ingestion::error::{IngestionError, IngestionResult};
use crate::ingestion::fs::FileSystem;
use crate::ingestion::transform::{check_content, ChunkValidator, Normalizer};
use crate::ingestion::types::{FileProcessingResult, FileProcessingStats, FileStatus};
use crate::logging::log_file_processed;

/// Progress events, independent of batch boundaries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestionEvent {
    FileProcessed(FileProcessingResult),
    RunCompleted {
        total_files: usize,
        processed_files: usize,
        failed_files: usize,
        skipped_files: usize,
    },
}

pub struct StreamingIngestionProcessor {
    fs: Arc<dyn FileSystem>,
    cache: Option<Arc<dyn ResultCache>>,
    config: IngestionConfig,
    events: broadcast::Sender<IngestionEvent>,
    accepting: AtomicBool,
    in_flight_batches: AtomicUsize,
    drained: Notify,
}

impl std::fmt::Debug for StreamingIngestionProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingIngestionProcessor")
            .field("config", &self.config)
            .field("cache", &self.cache.as_ref().map(|c| c.provider_name()))
            .field("accepting", &self.accepting.load(Ordering::SeqCst))
            .finish()
    }
}

/// Marks one batch in flight for the lifetime of the guard
struct BatchGuard<'a> {
    processor: &'a StreamingIngestionProcessor,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if self.processor.in_flight_batches.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.processor.drained.notify_waiters();
        }
    }
}

impl StreamingIngestionProcessor {
    pub fn new(fs: Arc<dyn FileSystem>, config: IngestionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            fs,
            cache: None,
            config,
            events,
            accepting: AtomicBool::new(true),
            in_flight_batches: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Used only while `enable_cache` is set
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestionEvent> {
        self.events.subscribe()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Process every path and return the run statistics.
    ///
    /// Fails only if the processor is shut down or the temp directory cannot be
    /// created. Files not started because shutdown began mid-run are reported
    /// as Skipped so the counts always add up to `paths.len()`.
    pub async fn process_files(&self, paths: &[PathBuf]) -> Result<FileProcessingStats> {
        if !self.is_accepting() {
            return Err(ImporterError::ShutdownInProgress);
        }
        let temp_dir = &self.config.temp_dir;
        self.fs
            .create_dir_all(temp_dir)
            .await
            .map_err(|e| IngestionError::io(temp_dir, e))?;

        info!(files = paths.len(), batch_size = self.batch_size(), "📥 Starting ingestion run");
        let mut stats = FileProcessingStats::new(paths.len());

        for (index, batch) in paths.chunks(self.batch_size()).enumerate() {
            let Some(_guard) = self.enter_batch() else {
                let remaining = &paths[index * self.batch_size()..];
                warn!(remaining = remaining.len(), "Shutdown began, skipping remaining files");
                for path in remaining {
                    let result = FileProcessingResult::skipped(path, 0, "ingestion is shutting down");
                    stats.record(self.publish(result));
                }
                break;
            };

            debug!(batch = index, files = batch.len(), "Processing batch");
            let results = join_all(batch.iter().map(|path| self.process_file(path))).await;
            for result in results {
                stats.record(result);
            }
        }

        stats.finalize();
        let _ = self.events.send(IngestionEvent::RunCompleted {
            total_files: stats.total_files,
            processed_files: stats.processed_files,
            failed_files: stats.failed_files,
            skipped_files: stats.skipped_files,
        });
        info!(
            total = stats.total_files,
            processed = stats.processed_files,
            failed = stats.failed_files,
            skipped = stats.skipped_files,
            avg_ms = stats.average_processing_time_ms,
            "📥 Ingestion run complete"
        );
        Ok(stats)
    }

    /// Stop admitting batches, wait for the in-flight batch, remove the temp directory
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);

        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();
            if self.in_flight_batches.load(Ordering::SeqCst) == 0 {
                break;
            }
            drained.await;
        }

        let temp_dir = &self.config.temp_dir;
        match self.fs.remove_dir_all(temp_dir).await {
            Ok(()) => debug!(dir = %temp_dir.display(), "Removed ingestion temp directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %temp_dir.display(), error = %e, "Failed to remove ingestion temp directory"),
        }
        info!("Ingestion processor shut down");
    }

    fn batch_size(&self) -> usize {
        self.config.max_concurrent_files.max(1)
    }

    /// Increment first, then check: a concurrent `shutdown` either sees this
    /// batch in flight or this batch sees `accepting == false`.
    fn enter_batch(&self) -> Option<BatchGuard<'_>> {
        self.in_flight_batches.fetch_add(1, Ordering::SeqCst);
        let guard = BatchGuard { processor: self };
        if self.accepting.load(Ordering::SeqCst) {
            Some(guard)
        } else {
            None
        }
    }

    fn active_cache(&self) -> Option<&Arc<dyn ResultCache>> {
        self.cache.as_ref().filter(|_| self.config.enable_cache)
    }

    async fn process_file(&self, path: &Path) -> FileProcessingResult {
        let started = Instant::now();
        let max_bytes = self.config.max_file_size_bytes;

        let size_bytes = match self.fs.file_size(path).await {
            Ok(size) => size,
            Err(e) => {
                let error = IngestionError::io(path, e).to_string();
                return self.publish(FileProcessingResult::failed(path, 0, elapsed_ms(started), error));
            }
        };

        if size_bytes > max_bytes {
            return self.publish(FileProcessingResult::skipped(
                path,
                size_bytes,
                format!("file size {size_bytes} exceeds limit of {max_bytes} bytes"),
            ));
        }

        let key = cache_key(path);
        if let Some(cache) = self.active_cache() {
            match cache.get(&key).await {
                Ok(Some(hit)) if hit.status == FileStatus::Success => {
                    debug!(file = %path.display(), "Cache hit");
                    return self.publish(hit);
                }
                Ok(_) => {}
                Err(e) => warn!(file = %path.display(), error = %e, "Result cache lookup failed"),
            }
        }

        let result = match self.transform(path).await {
            Ok((derived_id, content_length)) => FileProcessingResult::success(
                path,
                size_bytes,
                elapsed_ms(started),
                derived_id,
                content_length,
            ),
            Err(e) => FileProcessingResult::failed(path, size_bytes, elapsed_ms(started), e.to_string()),
        };

        if result.status == FileStatus::Success {
            if let Some(cache) = self.active_cache() {
                if let Err(e) = cache.set(&key, &result, self.config.cache_ttl()).await {
                    warn!(file = %path.display(), error = %e, "Result cache write failed");
                }
            }
        }

        self.publish(result)
    }

    /// Stream into a temp file, re-read it and check the normalized content
    async fn transform(&self, path: &Path) -> IngestionResult<(String, usize)> {
        let id = Uuid::new_v4();
        let partial = self.config.temp_dir.join(format!("{id}.partial"));
        let normalized = self.config.temp_dir.join(format!("{id}.normalized"));

        let outcome = match self.stream_to_temp(path, &partial, &normalized).await {
            Ok(()) => self.check_normalized(path, &normalized).await,
            Err(e) => Err(e),
        };

        self.remove_temp(&partial).await;
        self.remove_temp(&normalized).await;

        outcome.map(|content_length| (id.to_string(), content_length))
    }

    async fn stream_to_temp(&self, source: &Path, partial: &Path, normalized: &Path) -> IngestionResult<()> {
        let mut reader = self
            .fs
            .open_read(source)
            .await
            .map_err(|e| IngestionError::io(source, e))?;
        let mut writer = self
            .fs
            .create_write(partial)
            .await
            .map_err(|e| IngestionError::io(partial, e))?;

        let mut validator = ChunkValidator::new(self.config.max_file_size_bytes);
        let mut normalizer = Normalizer::new();
        let mut buffer = vec![0u8; self.config.chunk_size_bytes.max(1)];
        let mut output = Vec::with_capacity(buffer.len());

        loop {
            let read = reader
                .read(&mut buffer)
                .await
                .map_err(|e| IngestionError::io(source, e))?;
            if read == 0 {
                break;
            }
            let chunk = &buffer[..read];
            validator.validate(chunk)?;

            output.clear();
            normalizer.push(chunk, &mut output);
            writer
                .write_all(&output)
                .await
                .map_err(|e| IngestionError::io(partial, e))?;
        }
        normalizer.finish();

        writer
            .shutdown()
            .await
            .map_err(|e| IngestionError::io(partial, e))?;
        drop(writer);

        self.fs
            .rename(partial, normalized)
            .await
            .map_err(|e| IngestionError::io(normalized, e))
    }

    /// Errors name `source`; the temp path is an internal detail
    async fn check_normalized(&self, source: &Path, normalized: &Path) -> IngestionResult<usize> {
        let content = self
            .fs
            .read_to_string(normalized)
            .await
            .map_err(|e| IngestionError::io(source, e))?;
        check_content(
            &content,
            self.config.max_file_size_bytes,
            &self.config.document_markers,
        )?;
        Ok(content.len())
    }

    async fn remove_temp(&self, path: &Path) {
        match self.fs.remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = %path.display(), error = %e, "Failed to remove temp file"),
        }
    }

    fn publish(&self, result: FileProcessingResult) -> FileProcessingResult {
        log_file_processed(&result);
        // No subscribers is fine
        let _ = self.events.send(IngestionEvent::FileProcessed(result.clone()));
        result
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::cache::InMemoryResultCache;
    use crate::ingestion::fs::LocalFileSystem;

    fn config(temp_dir: &Path) -> IngestionConfig {
        IngestionConfig {
            temp_dir: temp_dir.to_path_buf(),
            chunk_size_bytes: 16,
            ..IngestionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_normalized_content_length_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("note.enex");
        tokio::fs::write(&input, "<en-note>  \r\nhello world \t\r\n</en-note>")
            .await
            .unwrap();

        let processor =
            StreamingIngestionProcessor::new(Arc::new(LocalFileSystem), config(&dir.path().join("tmp")));
        let stats = processor.process_files(&[input]).await.unwrap();

        let result = &stats.results[0];
        assert_eq!(result.status, FileStatus::Success);
        assert_eq!(
            result.content_length,
            Some("<en-note>\nhello world\n</en-note>".len())
        );
        assert!(result.derived_id.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_aborting_run() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.html");
        tokio::fs::write(&present, "<html>ok</html>").await.unwrap();

        let processor =
            StreamingIngestionProcessor::new(Arc::new(LocalFileSystem), config(&dir.path().join("tmp")));
        let stats = processor
            .process_files(&[dir.path().join("missing.html"), present])
            .await
            .unwrap();

        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.processed_files, 1);
        assert!(stats.results[0].error.as_deref().unwrap().contains("missing.html"));
    }

    #[tokio::test]
    async fn test_cache_hit_returns_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.html");
        tokio::fs::write(&input, "<html>ok</html>").await.unwrap();

        let processor =
            StreamingIngestionProcessor::new(Arc::new(LocalFileSystem), config(&dir.path().join("tmp")))
                .with_cache(Arc::new(InMemoryResultCache::new()));

        let first = processor.process_files(&[input.clone()]).await.unwrap();
        let second = processor.process_files(&[input]).await.unwrap();

        assert_eq!(first.results[0].derived_id, second.results[0].derived_id);
    }

    #[tokio::test]
    async fn test_process_after_shutdown_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().join("tmp");
        let processor = StreamingIngestionProcessor::new(Arc::new(LocalFileSystem), config(&temp_dir));

        processor.process_files(&[]).await.unwrap();
        assert!(temp_dir.exists());

        processor.shutdown().await;
        assert!(!temp_dir.exists());
        assert!(matches!(
            processor.process_files(&[]).await,
            Err(ImporterError::ShutdownInProgress)
        ));
    }

    #[tokio::test]
    async fn test_events_are_emitted_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.html");
        tokio::fs::write(&input, "<html>ok</html>").await.unwrap();

        let processor =
            StreamingIngestionProcessor::new(Arc::new(LocalFileSystem), config(&dir.path().join("tmp")));
        let mut events = processor.subscribe();
        processor.process_files(&[input]).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), IngestionEvent::FileProcessed(_)));
        assert!(matches!(
            events.recv().await.unwrap(),
            IngestionEvent::RunCompleted { total_files: 1, .. }
        ));
    }
}
