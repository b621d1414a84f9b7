//! # Local Mirror Database
//!
//! Opens the SQLite database behind [`SqliteRecordStore`](crate::SqliteRecordStore).
//!
//! Several batch workers write to the same file, so the pool is opened in
//! WAL mode with NORMAL synchronous and a busy timeout. SQLite then waits on
//! a held lock for up to `busy_timeout` before returning `SQLITE_BUSY`, and
//! whatever still surfaces is mapped to `BridgeError::StoreBusy` by the
//! store and retried by the engine's status tracker.
//!
//! The `catalog_records` schema ships in `migrations/` and is applied every
//! time a pool is opened.

use bridge_traits::error::{BridgeError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the mirror database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Private to one connection; the pool is pinned to a single connection
    Memory,
}

/// Pool settings for [`create_pool`].
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,
    pub max_connections: u32,
    /// How long a caller waits for a free pooled connection
    pub acquire_timeout: Duration,
    /// How long SQLite waits on a locked database before `SQLITE_BUSY`
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            max_connections: 1,
            ..Self::new(PathBuf::new())
        }
    }

    /// Ignored for in-memory databases.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn pool_size(&self) -> u32 {
        match self.location {
            DatabaseLocation::Memory => 1,
            DatabaseLocation::File(_) => self.max_connections,
        }
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = match &self.location {
            DatabaseLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            DatabaseLocation::Memory => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| BridgeError::DatabaseError(e.to_string()))?
                .journal_mode(SqliteJournalMode::Memory),
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the pool and apply migrations.
///
/// # Errors
///
/// [`BridgeError::DatabaseError`] when the file cannot be opened or a
/// migration fails.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    let pool_size = config.pool_size();
    info!(location = ?config.location, pool_size, "Opening mirror database");

    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size)
        .min_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| {
            warn!(error = %e, "Cannot open mirror database");
            BridgeError::DatabaseError(format!("open failed: {e}"))
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("migration failed: {e}")))?;
    debug!("Mirror schema up to date");

    Ok(pool)
}

/// In-memory pool with the schema applied, for tests.
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_has_catalog_records_table() {
        let pool = create_test_pool().await.unwrap();

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'catalog_records'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn test_file_pool_uses_wal() {
        let path = std::env::temp_dir().join(format!("catalog-mirror-{}.db", std::process::id()));
        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[test]
    fn test_memory_database_is_pinned_to_one_connection() {
        let config = DatabaseConfig::in_memory().max_connections(8);
        assert_eq!(config.pool_size(), 1);

        let file = DatabaseConfig::new("catalog.db")
            .max_connections(8)
            .busy_timeout(Duration::from_millis(250));
        assert_eq!(file.location, DatabaseLocation::File(PathBuf::from("catalog.db")));
        assert_eq!(file.pool_size(), 8);
        assert_eq!(file.busy_timeout, Duration::from_millis(250));
    }
}
