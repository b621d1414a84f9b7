//! SQLite-backed local record store

use async_trait::async_trait;
use bridge_traits::{
    catalog::{EntityKind, RemoteId},
    error::{BridgeError, Result},
    store::{LocalStore, PersistedRecord, RecordStatus},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, warn};

/// Record store over the `catalog_records` table
///
/// Safe to share between workers: the pool serializes writers and SQLite
/// lock contention is reported as [`BridgeError::StoreBusy`].
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a store over a pool created by [`crate::db::create_pool`]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All records of one kind ordered by remote id
    pub async fn list_records(&self, kind: EntityKind) -> Result<Vec<PersistedRecord>> {
        let rows: Vec<CatalogRecordRow> = sqlx::query_as(
            r#"
            SELECT kind, remote_id, local_index, name, slug, parent_remote_id,
                   status, message, payload, updated_at
            FROM catalog_records
            WHERE kind = ?
            ORDER BY remote_id
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(PersistedRecord::try_from).collect()
    }
}

#[async_trait]
impl LocalStore for SqliteRecordStore {
    async fn find_record(
        &self,
        kind: EntityKind,
        remote_id: RemoteId,
    ) -> Result<Option<PersistedRecord>> {
        let row: Option<CatalogRecordRow> = sqlx::query_as(
            r#"
            SELECT kind, remote_id, local_index, name, slug, parent_remote_id,
                   status, message, payload, updated_at
            FROM catalog_records
            WHERE kind = ? AND remote_id = ?
            "#,
        )
        .bind(kind.as_str())
        .bind(to_sql_id(remote_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(PersistedRecord::try_from).transpose()
    }

    async fn upsert_record(&self, record: &PersistedRecord) -> Result<()> {
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| BridgeError::DatabaseError(format!("invalid payload: {}", e)))?;
        let parent = record.parent_remote_id.map(to_sql_id).transpose()?;
        let local_index = record.local_index.map(|i| i as i64);

        sqlx::query(
            r#"
            INSERT INTO catalog_records (
                kind, remote_id, local_index, name, slug, parent_remote_id,
                status, message, payload, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(kind, remote_id) DO UPDATE SET
                local_index = excluded.local_index,
                name = excluded.name,
                slug = excluded.slug,
                parent_remote_id = excluded.parent_remote_id,
                status = excluded.status,
                message = excluded.message,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.kind.as_str())
        .bind(to_sql_id(record.remote_id)?)
        .bind(local_index)
        .bind(&record.name)
        .bind(&record.slug)
        .bind(parent)
        .bind(record.status.as_str())
        .bind(&record.message)
        .bind(payload)
        .bind(record.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(
            kind = %record.kind,
            remote_id = %record.remote_id,
            status = record.status.as_str(),
            "Upserted catalog record"
        );
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(Debug, FromRow)]
struct CatalogRecordRow {
    kind: String,
    remote_id: i64,
    local_index: Option<i64>,
    name: String,
    slug: Option<String>,
    parent_remote_id: Option<i64>,
    status: String,
    message: Option<String>,
    payload: String,
    updated_at: i64,
}

impl TryFrom<CatalogRecordRow> for PersistedRecord {
    type Error = BridgeError;

    fn try_from(row: CatalogRecordRow) -> Result<Self> {
        let payload: Map<String, Value> = serde_json::from_str(&row.payload)
            .map_err(|e| BridgeError::DatabaseError(format!("invalid payload JSON: {}", e)))?;
        let updated_at = DateTime::<Utc>::from_timestamp_millis(row.updated_at).ok_or_else(|| {
            BridgeError::DatabaseError(format!("invalid updated_at: {}", row.updated_at))
        })?;

        Ok(PersistedRecord {
            kind: row.kind.parse()?,
            remote_id: from_sql_id(row.remote_id)?,
            local_index: row.local_index.map(|i| i as usize),
            name: row.name,
            slug: row.slug,
            parent_remote_id: row.parent_remote_id.map(from_sql_id).transpose()?,
            status: row.status.parse::<RecordStatus>()?,
            message: row.message,
            payload,
            updated_at,
        })
    }
}

fn to_sql_id(id: RemoteId) -> Result<i64> {
    i64::try_from(id.get())
        .map_err(|_| BridgeError::DatabaseError(format!("remote id out of range: {}", id)))
}

fn from_sql_id(id: i64) -> Result<RemoteId> {
    u64::try_from(id)
        .map(RemoteId)
        .map_err(|_| BridgeError::DatabaseError(format!("negative remote id: {}", id)))
}

// ============================================================================
// Error mapping
// ============================================================================

/// Map sqlx errors, separating lock contention from hard failures
fn map_sqlx_error(err: sqlx::Error) -> BridgeError {
    match &err {
        sqlx::Error::Database(db) if is_lock_contention(db.code().as_deref(), db.message()) => {
            warn!(error = %err, "SQLite reported lock contention");
            BridgeError::StoreBusy(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut => BridgeError::StoreBusy(err.to_string()),
        _ => BridgeError::DatabaseError(err.to_string()),
    }
}

/// `SQLITE_BUSY` (5) and `SQLITE_LOCKED` (6), including extended codes
fn is_lock_contention(code: Option<&str>, message: &str) -> bool {
    let primary = code
        .and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xff);
    if matches!(primary, Some(5) | Some(6)) {
        return true;
    }
    let message = message.to_lowercase();
    message.contains("database is locked") || message.contains("database table is locked")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use std::sync::Arc;

    async fn store() -> SqliteRecordStore {
        SqliteRecordStore::new(create_test_pool().await.unwrap())
    }

    fn record(remote_id: u64, name: &str, status: RecordStatus) -> PersistedRecord {
        let mut record =
            PersistedRecord::new(EntityKind::Category, RemoteId(remote_id), name, status);
        record.slug = Some(name.to_lowercase());
        record
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let store = store().await;
        let mut created = record(42, "Shoes", RecordStatus::Created);
        created.local_index = Some(0);
        created.parent_remote_id = Some(RemoteId(7));
        created
            .payload
            .insert("description".into(), Value::from("All shoes"));

        store.upsert_record(&created).await.unwrap();

        let found = store
            .find_record(EntityKind::Category, RemoteId(42))
            .await
            .unwrap()
            .expect("record should exist");

        assert_eq!(found.name, "Shoes");
        assert_eq!(found.slug.as_deref(), Some("shoes"));
        assert_eq!(found.local_index, Some(0));
        assert_eq!(found.parent_remote_id, Some(RemoteId(7)));
        assert_eq!(found.status, RecordStatus::Created);
        assert_eq!(found.payload.get("description"), Some(&Value::from("All shoes")));
        assert_eq!(
            found.updated_at.timestamp_millis(),
            created.updated_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing_row() {
        let store = store().await;
        store
            .upsert_record(&record(42, "Shoes", RecordStatus::Created))
            .await
            .unwrap();

        let mut reused = record(42, "Shoes", RecordStatus::Reused);
        reused.message = Some("matched existing remote entity".into());
        store.upsert_record(&reused).await.unwrap();

        let all = store.list_records(EntityKind::Category).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, RecordStatus::Reused);
        assert_eq!(all[0].message.as_deref(), Some("matched existing remote entity"));
    }

    #[tokio::test]
    async fn test_kinds_are_partitioned() {
        let store = store().await;
        store
            .upsert_record(&record(1, "Shoes", RecordStatus::Created))
            .await
            .unwrap();

        let missing = store
            .find_record(EntityKind::Product, RemoteId(1))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts() {
        let store = Arc::new(store().await);

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .upsert_record(&record(i + 1, &format!("Item {}", i), RecordStatus::Created))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = store.list_records(EntityKind::Category).await.unwrap();
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn test_lock_contention_classification() {
        assert!(is_lock_contention(Some("5"), "database is locked"));
        assert!(is_lock_contention(Some("517"), "busy snapshot"));
        assert!(is_lock_contention(Some("262"), "locked shared cache"));
        assert!(is_lock_contention(None, "Database is locked"));
        assert!(!is_lock_contention(Some("19"), "UNIQUE constraint failed"));
        assert!(!is_lock_contention(Some("2067"), "UNIQUE constraint failed"));
    }

    #[test]
    fn test_pool_timeout_is_busy() {
        assert!(map_sqlx_error(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!map_sqlx_error(sqlx::Error::RowNotFound).is_transient());
    }
}
