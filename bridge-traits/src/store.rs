//! Local Record Store Abstraction
//!
//! The engine keeps a local mirror of every entity it has reused or created.
//! Stores must be safe to call from several workers at once; lock contention
//! should surface as [`BridgeError::StoreBusy`] so callers can retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{EntityKind, RemoteId};
use crate::error::{BridgeError, Result};

/// Mirror status of a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Entity already existed remotely and was adopted
    Reused,
    /// Entity was created by the engine
    Created,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reused => "reused",
            Self::Created => "created",
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reused" => Ok(Self::Reused),
            "created" => Ok(Self::Created),
            _ => Err(BridgeError::DatabaseError(format!(
                "invalid record status: {}",
                s
            ))),
        }
    }
}

/// Local row describing one mirrored entity, keyed by `(kind, remote_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub kind: EntityKind,
    pub remote_id: RemoteId,
    /// Position in the batch that last touched this record
    pub local_index: Option<usize>,
    pub name: String,
    pub slug: Option<String>,
    pub parent_remote_id: Option<RemoteId>,
    pub status: RecordStatus,
    pub message: Option<String>,
    pub payload: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedRecord {
    pub fn new(
        kind: EntityKind,
        remote_id: RemoteId,
        name: impl Into<String>,
        status: RecordStatus,
    ) -> Self {
        Self {
            kind,
            remote_id,
            local_index: None,
            name: name.into(),
            slug: None,
            parent_remote_id: None,
            status,
            message: None,
            payload: Map::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Local store trait
///
/// Only the two operations the batch engine needs; schema management and
/// other CRUD live with the concrete store.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Look up the record mirroring `remote_id`.
    async fn find_record(&self, kind: EntityKind, remote_id: RemoteId)
        -> Result<Option<PersistedRecord>>;

    /// Insert or replace the record for `(record.kind, record.remote_id)`.
    async fn upsert_record(&self, record: &PersistedRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_parsing() {
        assert_eq!("reused".parse::<RecordStatus>().unwrap(), RecordStatus::Reused);
        assert_eq!(
            "created".parse::<RecordStatus>().unwrap(),
            RecordStatus::Created
        );
        assert!(matches!(
            "failed".parse::<RecordStatus>(),
            Err(BridgeError::DatabaseError(_))
        ));
    }
}
