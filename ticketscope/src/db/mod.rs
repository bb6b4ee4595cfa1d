pub mod backends;
mod connection;
mod metadata;
pub mod repository;
pub(crate) mod schema;
pub mod traits;

use std::sync::Arc;

use crate::config::{CacheConfig, DatabaseConfig};
use crate::error::Result;

pub use backends::libsql::LibSqlBackend;
pub use backends::lru::LruSummaryStore;
pub use connection::{Database, StoreLocation};
pub use metadata::MetadataRepository;
pub use traits::*;

/// Open the durable cache and wrap it in the in-memory layer when configured.
pub async fn open_summary_store(
    database: &DatabaseConfig,
    cache: &CacheConfig,
) -> Result<Arc<dyn SummaryStore>> {
    let db = Database::new(database).await?;
    let durable: Arc<dyn SummaryStore> = Arc::new(LibSqlBackend::new(db));

    if cache.memory_capacity == 0 {
        return Ok(durable);
    }

    Ok(Arc::new(LruSummaryStore::new(durable, cache.memory_capacity)))
}
