use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;

/// Rows of the `ticketscope_meta` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    SchemaVersion,
    LastCleared,
}

impl MetaKey {
    fn as_str(self) -> &'static str {
        match self {
            Self::SchemaVersion => "schema_version",
            Self::LastCleared => "last_cleared_at",
        }
    }
}

pub struct MetadataRepository;

impl MetadataRepository {
    pub async fn read(conn: &Connection, key: MetaKey) -> Result<Option<String>> {
        let mut rows = conn
            .query(
                "SELECT value FROM ticketscope_meta WHERE key = ?1",
                params![key.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    pub async fn write(conn: &Connection, key: MetaKey, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO ticketscope_meta (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key.as_str(), value, Utc::now().to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    /// Unparseable values read as absent.
    pub async fn schema_version(conn: &Connection) -> Result<Option<u32>> {
        Ok(Self::read(conn, MetaKey::SchemaVersion)
            .await?
            .and_then(|v| v.parse().ok()))
    }

    pub async fn last_cleared(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
        Ok(Self::read(conn, MetaKey::LastCleared)
            .await?
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }
}
