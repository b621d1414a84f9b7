//! # Work Items and Outcomes
//!
//! A [`WorkItem`] describes one local entity queued for mirroring; an
//! [`ItemOutcome`] is the immutable result of processing it.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending -> Resolving -> {Reusing | Creating} -> Persisted | Failed
//! ```
//!
//! Only the terminal state is materialized: executors produce exactly one
//! [`ItemOutcome`] per item and never mutate it afterwards.

use bridge_traits::{CreateRequest, RemoteId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One entity to mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Position of the item in its plan
    pub local_index: usize,

    /// Display name as authored locally
    pub name: String,

    /// Slug as authored locally; empty lets the remote derive one
    pub slug: String,

    /// `local_index` of an earlier item this one hangs under
    pub parent_ref: Option<usize>,

    /// Kind-specific fields forwarded to the remote create call
    pub payload: Map<String, Value>,
}

impl WorkItem {
    pub fn new(local_index: usize, name: impl Into<String>) -> Self {
        Self {
            local_index,
            name: name.into(),
            slug: String::new(),
            parent_ref: None,
            payload: Map::new(),
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_parent(mut self, parent_ref: usize) -> Self {
        self.parent_ref = Some(parent_ref);
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Build the remote create payload, attaching `parent` when resolved.
    pub fn create_request(&self, parent: Option<RemoteId>) -> CreateRequest {
        CreateRequest::new(self.name.trim())
            .with_slug(self.slug.trim())
            .with_parent(parent)
            .with_payload(self.payload.clone())
    }
}

/// Terminal status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Matched an existing remote entity; no create call was made
    Reused,
    /// Created on the remote
    Created,
    /// Not mirrored, or mirrored remotely without a local record
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reused => "reused",
            Self::Created => "created",
            Self::Failed => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an item ended up [`ItemStatus::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The remote create call returned an error
    Remote,
    /// The remote create call exceeded its timer
    Timeout,
    /// The remote side succeeded or was reused but the local write failed
    LocalWrite,
    /// The batch was cancelled before the item was dispatched
    Cancelled,
    /// The worker holding the item stopped before it settled
    Interrupted,
}

/// Result of processing one [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub local_index: usize,
    pub name: String,
    pub status: ItemStatus,
    /// Present for reused and created items, and for local write failures
    pub remote_id: Option<RemoteId>,
    pub message: String,
    pub failure: Option<FailureCause>,
}

impl ItemOutcome {
    pub fn reused(item: &WorkItem, remote_id: RemoteId, message: impl Into<String>) -> Self {
        Self {
            local_index: item.local_index,
            name: item.name.clone(),
            status: ItemStatus::Reused,
            remote_id: Some(remote_id),
            message: message.into(),
            failure: None,
        }
    }

    pub fn created(item: &WorkItem, remote_id: RemoteId, message: impl Into<String>) -> Self {
        Self {
            local_index: item.local_index,
            name: item.name.clone(),
            status: ItemStatus::Created,
            remote_id: Some(remote_id),
            message: message.into(),
            failure: None,
        }
    }

    pub fn failed(item: &WorkItem, cause: FailureCause, message: impl Into<String>) -> Self {
        Self {
            local_index: item.local_index,
            name: item.name.clone(),
            status: ItemStatus::Failed,
            remote_id: None,
            message: message.into(),
            failure: Some(cause),
        }
    }

    /// The remote side settled but the local record could not be written.
    pub fn write_failed(item: &WorkItem, remote_id: RemoteId, message: impl Into<String>) -> Self {
        Self {
            remote_id: Some(remote_id),
            ..Self::failed(item, FailureCause::LocalWrite, message)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_trims_and_attaches_parent() {
        let item = WorkItem::new(1, "  Sneakers ")
            .with_slug(" sneakers ")
            .with_parent(0)
            .with_field("description", "Running shoes");

        let request = item.create_request(Some(RemoteId(12)));

        assert_eq!(request.name, "Sneakers");
        assert_eq!(request.slug.as_deref(), Some("sneakers"));
        assert_eq!(request.parent, Some(RemoteId(12)));
        assert_eq!(request.payload.get("description"), Some(&json!("Running shoes")));
    }

    #[test]
    fn test_create_request_empty_slug_is_omitted() {
        let request = WorkItem::new(0, "Boots").create_request(None);
        assert!(request.slug.is_none());
        assert!(request.parent.is_none());
    }

    #[test]
    fn test_write_failure_keeps_remote_id() {
        let item = WorkItem::new(4, "Hats");
        let outcome = ItemOutcome::write_failed(&item, RemoteId(77), "database is locked");

        assert_eq!(outcome.status, ItemStatus::Failed);
        assert_eq!(outcome.failure, Some(FailureCause::LocalWrite));
        assert_eq!(outcome.remote_id, Some(RemoteId(77)));
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_outcome_serializes_status_lowercase() {
        let outcome = ItemOutcome::created(&WorkItem::new(0, "Shoes"), RemoteId(5), "ok");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "created");
        assert_eq!(value["remote_id"], 5);
    }
}
