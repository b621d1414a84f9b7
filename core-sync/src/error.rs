use bridge_traits::{BridgeError, EntityKind, RemoteId};
use thiserror::Error;

/// Batch-level failures. Per-item problems never surface here; they are
/// folded into [`crate::ItemOutcome`] instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to fetch remote {kind} snapshot: {source}")]
    RemoteSnapshot {
        kind: EntityKind,
        #[source]
        source: BridgeError,
    },

    #[error("Concurrent execution requires independent items, but {count} item(s) reference a parent")]
    DependentItems { count: usize },

    #[error("Invalid work plan: {0}")]
    InvalidPlan(#[from] PlanError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<core_runtime::Error> for SyncError {
    fn from(err: core_runtime::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Rejections raised while building a [`crate::WorkPlan`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Item {local_index} has an empty name")]
    EmptyName { local_index: usize },

    #[error("Item at position {position} carries local index {local_index}")]
    IndexMismatch { position: usize, local_index: usize },

    #[error("Item {local_index} references parent {parent_ref}, which is not an earlier item")]
    ForwardParent {
        local_index: usize,
        parent_ref: usize,
    },

    #[error("{kind} items cannot reference a parent (item {local_index})")]
    NotHierarchical {
        kind: EntityKind,
        local_index: usize,
    },
}

/// A local mirror write that could not be completed.
///
/// The remote entity may already exist when this is returned; callers keep
/// its id in the item outcome.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to read local record for {kind} {remote_id} after {attempts} attempt(s): {source}")]
    ReadFailed {
        kind: EntityKind,
        remote_id: RemoteId,
        attempts: u32,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to write local record for {kind} {remote_id} after {attempts} attempt(s): {source}")]
    WriteFailed {
        kind: EntityKind,
        remote_id: RemoteId,
        attempts: u32,
        #[source]
        source: BridgeError,
    },
}

impl PersistError {
    pub fn attempts(&self) -> u32 {
        match self {
            PersistError::ReadFailed { attempts, .. } | PersistError::WriteFailed { attempts, .. } => {
                *attempts
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_error_keeps_source() {
        let err = SyncError::RemoteSnapshot {
            kind: EntityKind::Category,
            source: BridgeError::OperationFailed("connection reset".into()),
        };
        assert!(err.to_string().contains("category snapshot"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_persist_error_attempts() {
        let err = PersistError::WriteFailed {
            kind: EntityKind::Product,
            remote_id: RemoteId(9),
            attempts: 3,
            source: BridgeError::StoreBusy("database is locked".into()),
        };
        assert_eq!(err.attempts(), 3);
        assert!(err.to_string().contains("after 3 attempt(s)"));
    }
}
