//! Result cache for previously ingested files

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

use crate::ingestion::types::FileProcessingResult;

/// Cache key for one input path
pub fn cache_key(path: &Path) -> String {
    format!("ingestion:{}", path.display())
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<FileProcessingResult>>;

    async fn set(&self, key: &str, result: &FileProcessingResult, ttl: Duration) -> anyhow::Result<()>;

    fn provider_name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: FileProcessingResult,
    expires_at: Instant,
}

/// Process-local cache; expired entries are evicted on read
///
/// ```rust
/// use importer_core::ingestion::{cache_key, FileProcessingResult, InMemoryResultCache, ResultCache};
/// use std::path::Path;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let cache = InMemoryResultCache::new();
/// let path = Path::new("export/pancakes.html");
/// let result = FileProcessingResult::success(path, 2_048, 12, "note-1".to_string(), 1_980);
///
/// cache.set(&cache_key(path), &result, Duration::from_secs(60)).await.unwrap();
/// assert_eq!(cache.get(&cache_key(path)).await.unwrap(), Some(result));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryResultCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<FileProcessingResult>> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.result.clone()));

        match hit {
            Some(Some(result)) => Ok(Some(result)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, result: &FileProcessingResult, ttl: Duration) -> anyhow::Result<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                result: result.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}
