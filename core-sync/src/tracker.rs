//! # Per-Item Status Tracker
//!
//! Persists item outcomes into the [`LocalStore`] mirror.
//!
//! ## Overview
//!
//! - Created items insert a record built from the item and the entity the
//!   remote returned.
//! - Reused items update the existing record, or insert one, and fill any
//!   field the record lacks from the remote snapshot.
//! - Failed items without a remote id have nothing to mirror and are skipped.
//!
//! Every read and write goes through [`retry_with_backoff`] with
//! [`BridgeError::is_transient`] as the predicate, so store lock contention
//! from concurrent workers is absorbed locally. Exhausted retries surface as
//! [`PersistError`] for the caller to fold into the item's outcome.

use bridge_traits::{
    BridgeError, EntityKind, LocalStore, PersistedRecord, RecordStatus, RemoteEntity, RemoteId,
};
use chrono::Utc;
use core_runtime::ExecutionConfig;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::PersistError;
use crate::item::{ItemOutcome, ItemStatus, WorkItem};
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};

/// Remote fields copied into a reused record's payload when it lacks them
const BACKFILL_KEYS: &[&str] = &[
    "description",
    "image",
    "images",
    "count",
    "permalink",
    "sku",
    "regular_price",
    "status",
];

#[derive(Clone)]
pub struct StatusTracker {
    kind: EntityKind,
    store: Arc<dyn LocalStore>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTracker")
            .field("kind", &self.kind)
            .field("store", &"LocalStore { ... }")
            .field("policy", &self.policy)
            .finish()
    }
}

impl StatusTracker {
    pub fn new(kind: EntityKind, store: Arc<dyn LocalStore>, policy: RetryPolicy) -> Self {
        Self {
            kind,
            store,
            policy,
        }
    }

    /// Tracker using the write retry settings of `config`.
    pub fn from_config(
        kind: EntityKind,
        store: Arc<dyn LocalStore>,
        config: &ExecutionConfig,
    ) -> Self {
        Self::new(
            kind,
            store,
            RetryPolicy::linear(config.write_retry_attempts, config.write_retry_base_delay),
        )
    }

    /// Persist one settled outcome.
    ///
    /// `remote` is the entity returned by the create call, or the snapshot
    /// entry for a reused item.
    #[instrument(
        skip(self, item, outcome, remote),
        fields(kind = %self.kind, local_index = outcome.local_index, status = %outcome.status)
    )]
    pub async fn record(
        &self,
        item: &WorkItem,
        outcome: &ItemOutcome,
        remote: Option<&RemoteEntity>,
    ) -> Result<(), PersistError> {
        let (remote_id, status) = match (outcome.remote_id, outcome.status) {
            (Some(id), ItemStatus::Created) => (id, RecordStatus::Created),
            (Some(id), ItemStatus::Reused) => (id, RecordStatus::Reused),
            _ => {
                debug!("Nothing to persist for unsettled item");
                return Ok(());
            }
        };

        let mut record = match status {
            RecordStatus::Created => new_record(self.kind, remote_id, item, status),
            RecordStatus::Reused => match self.find(remote_id).await? {
                Some(existing) => existing,
                None => new_record(self.kind, remote_id, item, status),
            },
        };

        record.status = status;
        record.local_index = Some(outcome.local_index);
        record.message = Some(outcome.message.clone());
        record.updated_at = Utc::now();

        if let Some(remote) = remote {
            if status == RecordStatus::Created {
                apply_remote(&mut record, remote);
            }
            backfill(&mut record, remote);
        }

        self.upsert(&record).await
    }

    async fn find(&self, remote_id: RemoteId) -> Result<Option<PersistedRecord>, PersistError> {
        retry_with_backoff(&self.policy, BridgeError::is_transient, || {
            self.store.find_record(self.kind, remote_id)
        })
        .await
        .map_err(|RetryError { attempts, error }| {
            warn!(%remote_id, attempts, error = %error, "Local record read failed");
            PersistError::ReadFailed {
                kind: self.kind,
                remote_id,
                attempts,
                source: error,
            }
        })
    }

    async fn upsert(&self, record: &PersistedRecord) -> Result<(), PersistError> {
        retry_with_backoff(&self.policy, BridgeError::is_transient, || {
            self.store.upsert_record(record)
        })
        .await
        .map(|()| {
            debug!(remote_id = %record.remote_id, "Persisted local record");
        })
        .map_err(|RetryError { attempts, error }| {
            warn!(remote_id = %record.remote_id, attempts, error = %error, "Local record write failed");
            PersistError::WriteFailed {
                kind: self.kind,
                remote_id: record.remote_id,
                attempts,
                source: error,
            }
        })
    }
}

fn new_record(
    kind: EntityKind,
    remote_id: RemoteId,
    item: &WorkItem,
    status: RecordStatus,
) -> PersistedRecord {
    let mut record = PersistedRecord::new(kind, remote_id, item.name.trim(), status);
    let slug = item.slug.trim();
    if !slug.is_empty() {
        record.slug = Some(slug.to_string());
    }
    record.payload = item.payload.clone();
    record
}

/// The remote's view of a freshly created entity wins.
fn apply_remote(record: &mut PersistedRecord, remote: &RemoteEntity) {
    if !remote.name.trim().is_empty() {
        record.name = remote.name.clone();
    }
    if !remote.slug.is_empty() {
        record.slug = Some(remote.slug.clone());
    }
    record.parent_remote_id = remote.parent_id;
}

/// Fill fields the record lacks from the remote entity.
fn backfill(record: &mut PersistedRecord, remote: &RemoteEntity) {
    if record.name.trim().is_empty() {
        record.name = remote.name.clone();
    }
    if record.slug.as_deref().map_or(true, str::is_empty) && !remote.slug.is_empty() {
        record.slug = Some(remote.slug.clone());
    }
    if record.parent_remote_id.is_none() {
        record.parent_remote_id = remote.parent_id;
    }
    for key in BACKFILL_KEYS {
        if let Some(value) = remote.extra.get(*key).filter(|v| !is_blank(v)) {
            record
                .payload
                .entry(key.to_string())
                .or_insert_with(|| value.clone());
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::FailureCause;
    use bridge_traits::error::Result as BridgeResult;
    use mockall::mock;
    use mockall::predicate::*;
    use serde_json::json;
    use std::time::Duration;

    mock! {
        Store {}

        #[async_trait::async_trait]
        impl LocalStore for Store {
            async fn find_record(&self, kind: EntityKind, remote_id: RemoteId) -> BridgeResult<Option<PersistedRecord>>;
            async fn upsert_record(&self, record: &PersistedRecord) -> BridgeResult<()>;
        }
    }

    fn tracker(store: MockStore) -> StatusTracker {
        StatusTracker::new(
            EntityKind::Category,
            Arc::new(store),
            RetryPolicy::linear(3, Duration::from_millis(1)),
        )
    }

    fn remote(id: u64) -> RemoteEntity {
        let mut entity = RemoteEntity::new(id, "Shoes", "shoes").with_parent(3u64);
        entity.extra.insert("description".into(), json!("All shoes"));
        entity.extra.insert("menu_order".into(), json!(4));
        entity
    }

    #[tokio::test]
    async fn test_created_record_uses_remote_fields() {
        let mut store = MockStore::new();
        store.expect_find_record().never();
        store
            .expect_upsert_record()
            .withf(|record| {
                record.remote_id == RemoteId(42)
                    && record.status == RecordStatus::Created
                    && record.name == "Shoes"
                    && record.slug.as_deref() == Some("shoes")
                    && record.parent_remote_id == Some(RemoteId(3))
                    && record.local_index == Some(2)
                    && record.payload.get("color") == Some(&json!("red"))
                    && record.payload.get("description") == Some(&json!("All shoes"))
                    && record.payload.get("menu_order").is_none()
            })
            .times(1)
            .returning(|_| Ok(()));

        let item = WorkItem::new(2, "shoes ").with_field("color", "red");
        let outcome = ItemOutcome::created(&item, RemoteId(42), "Created");

        tracker(store)
            .record(&item, &outcome, Some(&remote(42)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reused_record_keeps_existing_fields_and_backfills() {
        let mut existing = PersistedRecord::new(
            EntityKind::Category,
            RemoteId(42),
            "Shoes (local)",
            RecordStatus::Created,
        );
        existing.payload.insert("description".into(), json!("Ours"));

        let mut store = MockStore::new();
        store
            .expect_find_record()
            .with(eq(EntityKind::Category), eq(RemoteId(42)))
            .times(1)
            .returning(move |_, _| Ok(Some(existing.clone())));
        store
            .expect_upsert_record()
            .withf(|record| {
                record.status == RecordStatus::Reused
                    && record.name == "Shoes (local)"
                    && record.slug.as_deref() == Some("shoes")
                    && record.parent_remote_id == Some(RemoteId(3))
                    && record.payload.get("description") == Some(&json!("Ours"))
            })
            .times(1)
            .returning(|_| Ok(()));

        let item = WorkItem::new(0, "Shoes");
        let outcome = ItemOutcome::reused(&item, RemoteId(42), "Reused");

        tracker(store)
            .record(&item, &outcome, Some(&remote(42)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_retries_transient_errors() {
        let mut store = MockStore::new();
        let mut calls = 0;
        store.expect_upsert_record().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(BridgeError::StoreBusy("database is locked".into()))
            } else {
                Ok(())
            }
        });

        let item = WorkItem::new(0, "Shoes");
        let outcome = ItemOutcome::created(&item, RemoteId(1), "Created");

        assert!(tracker(store).record(&item, &outcome, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_write_exhaustion_is_write_failure() {
        let mut store = MockStore::new();
        store
            .expect_upsert_record()
            .times(3)
            .returning(|_| Err(BridgeError::StoreBusy("database is locked".into())));

        let item = WorkItem::new(0, "Shoes");
        let outcome = ItemOutcome::created(&item, RemoteId(1), "Created");

        let err = tracker(store).record(&item, &outcome, None).await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::WriteFailed { remote_id: RemoteId(1), attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_hard_store_error_is_not_retried() {
        let mut store = MockStore::new();
        store
            .expect_upsert_record()
            .times(1)
            .returning(|_| Err(BridgeError::DatabaseError("disk I/O error".into())));

        let item = WorkItem::new(0, "Shoes");
        let outcome = ItemOutcome::created(&item, RemoteId(1), "Created");

        let err = tracker(store).record(&item, &outcome, None).await.unwrap_err();
        assert_eq!(err.attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_item_is_not_persisted() {
        let mut store = MockStore::new();
        store.expect_find_record().never();
        store.expect_upsert_record().never();

        let item = WorkItem::new(0, "Shoes");
        let outcome = ItemOutcome::failed(&item, FailureCause::Remote, "HTTP 400");

        assert!(tracker(store).record(&item, &outcome, None).await.is_ok());
    }
}
