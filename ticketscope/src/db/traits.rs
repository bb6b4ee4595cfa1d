use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::CacheWritePolicy;
use crate::error::Result;
use crate::models::{CacheEntry, CacheKey};

/// Durable summary cache keyed by (content hash, provider, model).
///
/// Implementations report faults as `TicketError::Storage`; callers decide whether to
/// degrade to an uncached run.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Store an entry. Under `Overwrite` the newest write wins; under `KeepExisting` an
    /// existing entry is left untouched.
    async fn put(&self, entry: &CacheEntry, policy: CacheWritePolicy) -> Result<()>;

    async fn count(&self) -> Result<u64>;

    /// Remove every entry, returning how many were deleted.
    async fn clear(&self) -> Result<u64>;

    /// When `clear` last ran, if the store keeps track.
    async fn last_cleared(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}
