//! Per-item pipeline shared by both executors.
//!
//! ```text
//! decision ──Reuse──────────────────────────────┐
//!          └─Create──> remote create (timed) ───┴──> persist ──> outcome
//! ```
//!
//! Every path ends in exactly one [`ItemOutcome`]; errors never escape.

use bridge_traits::{EntityKind, RemoteCatalog, RemoteEntity, RemoteId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::item::{FailureCause, ItemOutcome, WorkItem};
use crate::reconcile::{RemoteIndex, ResolutionDecision};
use crate::tracker::StatusTracker;

/// How an item's `parent_ref` resolved against the running index map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParentResolution {
    /// No parent requested
    Root,
    Resolved(RemoteId),
    /// The parent item has no remote id; the child goes in as a root
    Missing(usize),
}

impl ParentResolution {
    fn remote_id(&self) -> Option<RemoteId> {
        match self {
            Self::Resolved(id) => Some(*id),
            Self::Root | Self::Missing(_) => None,
        }
    }
}

/// A settled item plus the entity the remote created for it, if any.
pub(crate) struct Processed {
    pub outcome: ItemOutcome,
    pub created: Option<RemoteEntity>,
}

pub(crate) struct ItemProcessor {
    kind: EntityKind,
    catalog: Arc<dyn RemoteCatalog>,
    tracker: StatusTracker,
    remote_call_timeout: Option<Duration>,
}

impl ItemProcessor {
    pub(crate) fn new(
        kind: EntityKind,
        catalog: Arc<dyn RemoteCatalog>,
        tracker: StatusTracker,
        remote_call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            kind,
            catalog,
            tracker,
            remote_call_timeout,
        }
    }

    #[instrument(
        skip(self, item, index),
        fields(kind = %self.kind, local_index = item.local_index, name = %item.name)
    )]
    pub(crate) async fn process(
        &self,
        item: &WorkItem,
        decision: ResolutionDecision,
        parent: ParentResolution,
        index: &RemoteIndex,
    ) -> Processed {
        match decision {
            ResolutionDecision::Reuse(remote_id) => {
                debug!(%remote_id, "Reusing existing remote entity");
                let outcome = ItemOutcome::reused(
                    item,
                    remote_id,
                    format!("Reused existing {} {}", self.kind, remote_id),
                );
                let outcome = self.persist(item, outcome, index.entity(remote_id)).await;
                Processed {
                    outcome,
                    created: None,
                }
            }
            ResolutionDecision::Create => self.create(item, parent).await,
        }
    }

    async fn create(&self, item: &WorkItem, parent: ParentResolution) -> Processed {
        if let ParentResolution::Missing(parent_ref) = parent {
            warn!(parent_ref, "Parent has no remote id, creating as root");
        }

        let request = item.create_request(parent.remote_id());
        let call = self.catalog.create_entity(self.kind, request);
        let result = match self.remote_call_timeout {
            Some(limit) => match timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Remote create timed out");
                    return Processed {
                        outcome: ItemOutcome::failed(
                            item,
                            FailureCause::Timeout,
                            format!("Remote create timed out after {:?}", limit),
                        ),
                        created: None,
                    };
                }
            },
            None => call.await,
        };

        let entity = match result {
            Ok(entity) => entity,
            Err(e) => {
                warn!(error = %e, "Remote create failed");
                return Processed {
                    outcome: ItemOutcome::failed(item, FailureCause::Remote, e.to_string()),
                    created: None,
                };
            }
        };

        let mut message = format!("Created {} {}", self.kind, entity.id);
        if let ParentResolution::Missing(parent_ref) = parent {
            message.push_str(&format!(
                " as root: parent item {} has no remote id",
                parent_ref
            ));
        }

        let outcome = ItemOutcome::created(item, entity.id, message);
        let outcome = self.persist(item, outcome, Some(&entity)).await;
        Processed {
            outcome,
            created: Some(entity),
        }
    }

    /// Persist a settled outcome; a write failure keeps the remote id.
    async fn persist(
        &self,
        item: &WorkItem,
        outcome: ItemOutcome,
        remote: Option<&RemoteEntity>,
    ) -> ItemOutcome {
        match self.tracker.record(item, &outcome, remote).await {
            Ok(()) => outcome,
            Err(e) => match outcome.remote_id {
                Some(remote_id) => ItemOutcome::write_failed(
                    item,
                    remote_id,
                    format!("{} but local record not saved: {}", outcome.message, e),
                ),
                None => ItemOutcome::failed(item, FailureCause::LocalWrite, e.to_string()),
            },
        }
    }
}
