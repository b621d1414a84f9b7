//! Dependency-ordered executor.
//!
//! Processes items strictly in plan order on the calling task. Parents
//! always settle before their children, and a running
//! `local_index -> remote_id` map resolves each child's parent.

use bridge_traits::RemoteId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::item::{FailureCause, ItemOutcome, WorkItem};
use crate::processor::{ItemProcessor, ParentResolution};
use crate::progress::ProgressReporter;
use crate::reconcile::RemoteIndex;

/// Settled outcomes in plan order, and whether the run stopped early.
pub(crate) struct SequentialRun {
    pub outcomes: Vec<ItemOutcome>,
    pub cancelled: bool,
}

pub(crate) async fn run_sequential(
    processor: &ItemProcessor,
    items: Vec<WorkItem>,
    mut index: RemoteIndex,
    progress: Arc<ProgressReporter>,
    cancel: &CancellationToken,
) -> SequentialRun {
    let mut resolved: HashMap<usize, RemoteId> = HashMap::with_capacity(items.len());
    let mut outcomes = Vec::with_capacity(items.len());
    let mut cancelled = false;

    for item in &items {
        if cancelled || cancel.is_cancelled() {
            if !cancelled {
                info!(
                    remaining = items.len() - outcomes.len(),
                    "Cancellation requested, skipping remaining items"
                );
                cancelled = true;
            }
            let outcome =
                ItemOutcome::failed(item, FailureCause::Cancelled, "Batch cancelled before dispatch");
            progress.item_settled(&outcome);
            outcomes.push(outcome);
            continue;
        }

        let parent = match item.parent_ref {
            None => ParentResolution::Root,
            Some(parent_ref) => match resolved.get(&parent_ref) {
                Some(remote_id) => ParentResolution::Resolved(*remote_id),
                None => ParentResolution::Missing(parent_ref),
            },
        };

        let decision = index.resolve(item);
        debug!(local_index = item.local_index, ?decision, ?parent, "Resolved item");

        let processed = processor.process(item, decision, parent, &index).await;

        if let Some(remote_id) = processed.outcome.remote_id {
            resolved.insert(item.local_index, remote_id);
        }
        if let Some(entity) = processed.created {
            index.register(entity);
        }

        progress.item_settled(&processed.outcome);
        outcomes.push(processed.outcome);
    }

    SequentialRun {
        outcomes,
        cancelled,
    }
}
