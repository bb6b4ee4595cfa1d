use libsql::{Builder, Connection};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::Result;

use super::schema;

/// Where the cache database lives, parsed once from `DATABASE_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Remote { url: String, auth_token: String },
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    pub fn parse(url: &str, auth_token: Option<&str>) -> Self {
        let url = url.trim();
        if url.starts_with("libsql://") || url.starts_with("https://") {
            Self::Remote {
                url: url.to_string(),
                auth_token: auth_token.unwrap_or_default().to_string(),
            }
        } else if url == ":memory:" || url == "file::memory:" {
            Self::Memory
        } else {
            Self::File(PathBuf::from(url.strip_prefix("file:").unwrap_or(url)))
        }
    }
}

/// Handle to the cache database.
///
/// Local connections get the busy timeout applied on every `connect`, since SQLite
/// scopes it per connection. An in-memory database exists only as long as its
/// connection, so that mode hands out clones of one shared connection.
#[derive(Clone)]
pub struct Database {
    db: Arc<libsql::Database>,
    location: StoreLocation,
    shared: Option<Connection>,
    busy_timeout_ms: u64,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let location = StoreLocation::parse(&config.url, config.auth_token.as_deref());

        let db = match &location {
            StoreLocation::Remote { url, auth_token } => {
                Builder::new_remote(url.clone(), auth_token.clone())
                    .build()
                    .await?
            }
            StoreLocation::Memory => Builder::new_local(":memory:").build().await?,
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Builder::new_local(path).build().await?
            }
        };

        let shared = match location {
            StoreLocation::Memory => Some(db.connect()?),
            _ => None,
        };

        let database = Self {
            db: Arc::new(db),
            location,
            shared,
            busy_timeout_ms: config.busy_timeout_ms,
        };

        let conn = database.connect().await?;
        database
            .set_journal_mode(&conn, normalize_journal_mode(&config.journal_mode))
            .await;
        schema::init_schema(&conn).await?;

        tracing::debug!(location = ?database.location, "Summary cache database ready");
        Ok(database)
    }

    pub async fn connect(&self) -> Result<Connection> {
        if let Some(conn) = &self.shared {
            return Ok(conn.clone());
        }

        let conn = self.db.connect()?;
        if matches!(self.location, StoreLocation::File(_)) {
            let sql = format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms);
            if let Err(error) = conn.execute_batch(&sql).await {
                tracing::warn!(
                    busy_timeout_ms = self.busy_timeout_ms,
                    error = %error,
                    "Failed to set SQLite busy_timeout"
                );
            }
        }
        Ok(conn)
    }

    async fn set_journal_mode(&self, conn: &Connection, mode: &str) {
        if !matches!(self.location, StoreLocation::File(_)) {
            return;
        }
        let sql = format!("PRAGMA journal_mode = {mode}");
        if let Err(error) = conn.execute_batch(&sql).await {
            tracing::warn!(mode, error = %error, "Failed to set SQLite journal_mode");
        }
    }
}

fn normalize_journal_mode(value: &str) -> &'static str {
    match value.trim().to_uppercase().as_str() {
        "DELETE" => "DELETE",
        "TRUNCATE" => "TRUNCATE",
        "PERSIST" => "PERSIST",
        "WAL" => "WAL",
        _ => "WAL",
    }
}
