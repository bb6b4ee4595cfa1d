use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::config::CacheWritePolicy;
use crate::db::traits::SummaryStore;
use crate::error::Result;
use crate::models::{CacheEntry, CacheKey};

/// Read-through LRU layer in front of a durable summary store.
///
/// Hits are served from memory; misses fall through to the inner store and are
/// remembered. Writes go to the inner store first and only populate memory once the
/// inner write succeeded, so memory never holds an entry the durable store rejected.
#[derive(Clone)]
pub struct LruSummaryStore {
    inner: Arc<dyn SummaryStore>,
    cache: Arc<Mutex<LruCache<CacheKey, CacheEntry>>>,
}

impl LruSummaryStore {
    /// # Panics
    /// Panics if capacity is 0
    pub fn new(inner: Arc<dyn SummaryStore>, capacity: usize) -> Self {
        let cache = LruCache::new(NonZeroUsize::new(capacity).expect("Capacity must be non-zero"));
        Self {
            inner,
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    fn remember(&self, entry: CacheEntry) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(entry.key(), entry);
    }
}

#[async_trait]
impl SummaryStore for LruSummaryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        if let Some(entry) = self.cached(key) {
            return Ok(Some(entry));
        }

        let entry = self.inner.get(key).await?;
        if let Some(entry) = &entry {
            self.remember(entry.clone());
        }
        Ok(entry)
    }

    async fn put(&self, entry: &CacheEntry, policy: CacheWritePolicy) -> Result<()> {
        self.inner.put(entry, policy).await?;

        match policy {
            CacheWritePolicy::Overwrite => self.remember(entry.clone()),
            // The inner store may have kept an older entry; drop ours and re-read lazily.
            CacheWritePolicy::KeepExisting => {
                let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
                cache.pop(&entry.key());
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn clear(&self) -> Result<u64> {
        let removed = self.inner.clear().await?;
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(removed)
    }

    async fn last_cleared(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_cleared().await
    }
}
