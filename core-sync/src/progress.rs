//! Progress reporting for batch runs.

use bridge_traits::ProgressSink;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::item::{ItemOutcome, ItemStatus};

/// Default sink that forwards updates to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn report(&self, current: usize, total: usize, message: &str) {
        debug!(current, total, "{}", message);
    }
}

/// Counts settled items for one run and forwards updates to the sink.
///
/// The counter only feeds progress messages; executors never branch on it.
pub(crate) struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    total: usize,
    processed: AtomicUsize,
}

impl ProgressReporter {
    pub(crate) fn new(sink: Arc<dyn ProgressSink>, total: usize) -> Self {
        Self {
            sink,
            total,
            processed: AtomicUsize::new(0),
        }
    }

    /// Report a phase message without advancing the counter.
    pub(crate) fn phase(&self, message: &str) {
        self.sink
            .report(self.processed.load(Ordering::Relaxed), self.total, message);
    }

    /// Advance the counter for one settled item.
    pub(crate) fn item_settled(&self, outcome: &ItemOutcome) {
        let current = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        let message = match outcome.status {
            ItemStatus::Created => format!("Created '{}'", outcome.name),
            ItemStatus::Reused => format!("Reused '{}'", outcome.name),
            ItemStatus::Failed => format!("Failed '{}': {}", outcome.name, outcome.message),
        };
        self.sink.report(current, self.total, &message);
    }

    pub(crate) fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }
}
