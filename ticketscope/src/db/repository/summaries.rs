use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::config::CacheWritePolicy;
use crate::db::metadata::{MetaKey, MetadataRepository};
use crate::error::{Result, TicketError};
use crate::models::{CacheEntry, CacheKey, ContentHash, Summary};

pub struct SummaryRepository;

impl SummaryRepository {
    pub async fn get(conn: &Connection, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let mut rows = conn
            .query(
                r#"
                SELECT content_hash, provider, model, customer_number, product, summary, created_at
                FROM summaries
                WHERE content_hash = ?1 AND provider = ?2 AND model = ?3
                "#,
                params![
                    key.content_hash.as_str(),
                    key.provider.as_str(),
                    key.model.as_str()
                ],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn upsert(
        conn: &Connection,
        entry: &CacheEntry,
        policy: CacheWritePolicy,
    ) -> Result<()> {
        let conflict_clause = match policy {
            CacheWritePolicy::Overwrite => {
                "ON CONFLICT(content_hash, provider, model) DO UPDATE SET
                    customer_number = excluded.customer_number,
                    product = excluded.product,
                    summary = excluded.summary,
                    created_at = excluded.created_at"
            }
            CacheWritePolicy::KeepExisting => {
                "ON CONFLICT(content_hash, provider, model) DO NOTHING"
            }
        };

        let sql = format!(
            r#"
            INSERT INTO summaries (
                content_hash, provider, model, customer_number, product, summary, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7
            )
            {conflict_clause}
            "#
        );

        let summary = serde_json::to_string(&entry.summary)?;

        conn.execute(
            &sql,
            params![
                entry.content_hash.as_str(),
                entry.provider.as_str(),
                entry.model.as_str(),
                entry.customer_number.as_str(),
                entry.product.as_str(),
                summary,
                entry.created_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn count(conn: &Connection) -> Result<u64> {
        let mut rows = conn.query("SELECT COUNT(*) FROM summaries", ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }

    /// Removes every entry and stamps the clear time in the metadata table.
    pub async fn delete_all(conn: &Connection) -> Result<u64> {
        let removed = conn.execute("DELETE FROM summaries", ()).await?;
        MetadataRepository::write(conn, MetaKey::LastCleared, &Utc::now().to_rfc3339()).await?;
        Ok(removed)
    }

    fn row_to_entry(row: &libsql::Row) -> Result<CacheEntry> {
        let content_hash: String = row.get(0)?;
        let raw_summary: String = row.get(5)?;
        let summary: Summary = serde_json::from_str(&raw_summary).map_err(|e| {
            TicketError::Storage(format!(
                "Corrupt cached summary for {content_hash}: {e}"
            ))
        })?;
        let raw_created_at: String = row.get(6)?;
        let created_at = DateTime::parse_from_rfc3339(&raw_created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                TicketError::Storage(format!(
                    "Corrupt created_at '{raw_created_at}' for {content_hash}: {e}"
                ))
            })?;

        Ok(CacheEntry {
            content_hash: ContentHash::from_hex(content_hash),
            provider: row.get(1)?,
            model: row.get(2)?,
            customer_number: row.get(3)?,
            product: row.get(4)?,
            summary,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;
    use crate::models::SummarySection;

    async fn setup_test_db() -> Connection {
        let conn = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap();
        init_schema(&conn).await.unwrap();
        conn
    }

    fn entry(narrative: &str) -> CacheEntry {
        CacheEntry {
            content_hash: ContentHash::from_hex("ab".repeat(32)),
            provider: "ollama".to_string(),
            model: "qwen2.5:7b".to_string(),
            customer_number: "C100".to_string(),
            product: "Router".to_string(),
            summary: Summary::new(vec![SummarySection::new("Initial Issue", narrative)]),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let conn = setup_test_db().await;
        let stored = entry("Router offline");

        SummaryRepository::upsert(&conn, &stored, CacheWritePolicy::Overwrite)
            .await
            .unwrap();

        let loaded = SummaryRepository::get(&conn, &stored.key())
            .await
            .unwrap()
            .expect("entry should exist");
        assert_eq!(loaded.summary, stored.summary);
        assert_eq!(loaded.customer_number, "C100");
    }

    #[tokio::test]
    async fn test_overwrite_policy_replaces() {
        let conn = setup_test_db().await;
        SummaryRepository::upsert(&conn, &entry("first"), CacheWritePolicy::Overwrite)
            .await
            .unwrap();
        SummaryRepository::upsert(&conn, &entry("second"), CacheWritePolicy::Overwrite)
            .await
            .unwrap();

        let loaded = SummaryRepository::get(&conn, &entry("x").key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.summary.sections[0].narrative, "second");
        assert_eq!(SummaryRepository::count(&conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keep_existing_policy_ignores_later_writes() {
        let conn = setup_test_db().await;
        SummaryRepository::upsert(&conn, &entry("first"), CacheWritePolicy::KeepExisting)
            .await
            .unwrap();
        SummaryRepository::upsert(&conn, &entry("second"), CacheWritePolicy::KeepExisting)
            .await
            .unwrap();

        let loaded = SummaryRepository::get(&conn, &entry("x").key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.summary.sections[0].narrative, "first");
    }

    #[tokio::test]
    async fn test_corrupt_summary_is_storage_error() {
        let conn = setup_test_db().await;
        let stored = entry("ok");
        conn.execute(
            "INSERT INTO summaries VALUES (?1, ?2, ?3, 'C100', 'Router', 'not json', ?4)",
            params![
                stored.content_hash.as_str(),
                stored.provider.as_str(),
                stored.model.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )
        .await
        .unwrap();

        let result = SummaryRepository::get(&conn, &stored.key()).await;
        assert!(matches!(result, Err(TicketError::Storage(_))));
    }

    #[tokio::test]
    async fn test_delete_all() {
        let conn = setup_test_db().await;
        SummaryRepository::upsert(&conn, &entry("a"), CacheWritePolicy::Overwrite)
            .await
            .unwrap();
        assert_eq!(SummaryRepository::delete_all(&conn).await.unwrap(), 1);
        assert_eq!(SummaryRepository::count(&conn).await.unwrap(), 0);
        assert!(MetadataRepository::last_cleared(&conn)
            .await
            .unwrap()
            .is_some());
    }
}
