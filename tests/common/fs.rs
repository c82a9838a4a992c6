//! Filesystem double that records which files were opened and how many at once

use async_trait::async_trait;
use importer_core::ingestion::{
    BoxedReader, BoxedWriter, FileProcessingResult, FileSystem, LocalFileSystem, ResultCache,
};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct CountingFileSystem {
    inner: LocalFileSystem,
    opened: Mutex<Vec<PathBuf>>,
    open_delay: Duration,
    opening: AtomicUsize,
    max_opening: AtomicUsize,
}

impl CountingFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open_read` takes at least `delay`
    pub fn with_open_delay(delay: Duration) -> Self {
        Self {
            open_delay: delay,
            ..Self::default()
        }
    }

    /// Highest number of `open_read` calls observed in progress together
    pub fn max_concurrent_opens(&self) -> usize {
        self.max_opening.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().clone()
    }

    pub fn was_opened(&self, path: &Path) -> bool {
        self.opened.lock().iter().any(|p| p == path)
    }
}

#[async_trait]
impl FileSystem for CountingFileSystem {
    async fn file_size(&self, path: &Path) -> io::Result<u64> {
        self.inner.file_size(path).await
    }

    async fn open_read(&self, path: &Path) -> io::Result<BoxedReader> {
        self.opened.lock().push(path.to_path_buf());
        let opening = self.opening.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_opening.fetch_max(opening, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        let reader = self.inner.open_read(path).await;
        self.opening.fetch_sub(1, Ordering::SeqCst);
        reader
    }

    async fn create_write(&self, path: &Path) -> io::Result<BoxedWriter> {
        self.inner.create_write(path).await
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.inner.read_to_string(path).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir_all(path).await
    }
}

/// Result cache whose every call fails
#[derive(Debug, Default)]
pub struct FailingCache {
    calls: AtomicUsize,
}

impl FailingCache {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultCache for FailingCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<FileProcessingResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("redis down")
    }

    async fn set(&self, _key: &str, _result: &FileProcessingResult, _ttl: Duration) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("redis down")
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }
}
