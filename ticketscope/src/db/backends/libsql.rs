use crate::config::CacheWritePolicy;
use crate::db::connection::Database;
use crate::db::metadata::MetadataRepository;
use crate::db::repository::SummaryRepository;
use crate::db::traits::SummaryStore;
use crate::error::Result;
use crate::models::{CacheEntry, CacheKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SummaryStore for LibSqlBackend {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let conn = self.db.connect().await?;
        SummaryRepository::get(&conn, key).await
    }
    async fn put(&self, entry: &CacheEntry, policy: CacheWritePolicy) -> Result<()> {
        let conn = self.db.connect().await?;
        SummaryRepository::upsert(&conn, entry, policy).await
    }
    async fn count(&self) -> Result<u64> {
        let conn = self.db.connect().await?;
        SummaryRepository::count(&conn).await
    }
    async fn clear(&self) -> Result<u64> {
        let conn = self.db.connect().await?;
        SummaryRepository::delete_all(&conn).await
    }
    async fn last_cleared(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.db.connect().await?;
        MetadataRepository::last_cleared(&conn).await
    }
}
