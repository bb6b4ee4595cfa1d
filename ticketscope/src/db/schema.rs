use libsql::Connection;

use crate::error::Result;

use super::metadata::{MetaKey, MetadataRepository};

pub const SCHEMA_VERSION: u32 = 1;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Generated summaries, one per (content hash, provider, model)
        CREATE TABLE IF NOT EXISTS summaries (
            content_hash TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            customer_number TEXT NOT NULL,
            product TEXT NOT NULL,
            summary TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (content_hash, provider, model)
        );

        CREATE INDEX IF NOT EXISTS idx_summaries_group ON summaries(customer_number, product);

        CREATE TABLE IF NOT EXISTS ticketscope_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .await?;

    match MetadataRepository::schema_version(conn).await? {
        Some(version) if version > SCHEMA_VERSION => {
            tracing::warn!(
                stored = version,
                supported = SCHEMA_VERSION,
                "Cache database was written by a newer version"
            );
        }
        Some(version) if version == SCHEMA_VERSION => {}
        _ => {
            MetadataRepository::write(conn, MetaKey::SchemaVersion, &SCHEMA_VERSION.to_string())
                .await?
        }
    }

    Ok(())
}
