//! # Bounded Concurrent Executor
//!
//! A fixed pool of worker tasks drains one shared queue of independent
//! items.
//!
//! ## Model
//!
//! - Every item is queued up front and the sender is dropped, so the queue
//!   only ever shrinks.
//! - Each worker dequeues with a short timeout and exits when the queue is
//!   empty or the timeout fires.
//! - A worker runs one item's whole pipeline (remote call, local write)
//!   before taking the next, then sleeps `inter_item_delay`.
//! - Worker start-up is staggered by `stagger_delay`.
//! - Cancellation stops new dequeues; items already taken run to completion.
//!
//! Workers publish a [`WorkerEvent`] when they take an item and again when
//! it settles, so the pool owner keeps every settled outcome even if the
//! worker that produced it later panics. The run returns only after every
//! worker has been joined. An item a dead worker had taken settles as
//! `Interrupted`; an item still queued settles as `Cancelled` when the run
//! was cancelled and `Interrupted` otherwise.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::item::{FailureCause, ItemOutcome, WorkItem};
use crate::processor::{ItemProcessor, ParentResolution};
use crate::progress::ProgressReporter;
use crate::reconcile::RemoteIndex;

type SharedQueue = Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>;

/// Progress of one item as seen by the pool owner.
#[derive(Debug)]
enum WorkerEvent {
    Taken(usize),
    Settled(ItemOutcome),
}

/// Pool sizing and pacing for one concurrent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyOptions {
    pub worker_count: usize,
    /// Pause each worker takes between its own successive items
    pub inter_item_delay: Duration,
    /// Pause between starting successive workers
    pub stagger_delay: Duration,
}

impl Default for ConcurrencyOptions {
    fn default() -> Self {
        Self::from(&core_runtime::ExecutionConfig::default())
    }
}

impl From<&core_runtime::ExecutionConfig> for ConcurrencyOptions {
    fn from(config: &core_runtime::ExecutionConfig) -> Self {
        Self {
            worker_count: config.worker_count,
            inter_item_delay: config.inter_item_delay,
            stagger_delay: config.stagger_delay,
        }
    }
}

impl ConcurrencyOptions {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    pub fn with_inter_item_delay(mut self, delay: Duration) -> Self {
        self.inter_item_delay = delay;
        self
    }

    pub fn with_stagger_delay(mut self, delay: Duration) -> Self {
        self.stagger_delay = delay;
        self
    }
}

pub(crate) struct ConcurrentRun {
    pub outcomes: Vec<ItemOutcome>,
    pub cancelled: bool,
}

#[derive(Clone)]
struct WorkerContext {
    queue: SharedQueue,
    events: mpsc::UnboundedSender<WorkerEvent>,
    processor: Arc<ItemProcessor>,
    index: Arc<RemoteIndex>,
    progress: Arc<ProgressReporter>,
    cancel: CancellationToken,
    inter_item_delay: Duration,
    dequeue_timeout: Duration,
}

#[instrument(skip_all, fields(items = items.len(), workers = options.worker_count))]
pub(crate) async fn run_concurrent(
    processor: Arc<ItemProcessor>,
    items: Vec<WorkItem>,
    index: Arc<RemoteIndex>,
    progress: Arc<ProgressReporter>,
    cancel: CancellationToken,
    options: ConcurrencyOptions,
    dequeue_timeout: Duration,
) -> ConcurrentRun {
    let pending: Vec<WorkItem> = items.clone();
    let worker_count = options.worker_count.clamp(1, items.len().max(1));

    let (tx, rx) = mpsc::unbounded_channel();
    for item in items {
        if tx.send(item).is_err() {
            break;
        }
    }
    drop(tx);

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let context = WorkerContext {
        queue: Arc::new(Mutex::new(rx)),
        events: events_tx,
        processor,
        index,
        progress: progress.clone(),
        cancel: cancel.clone(),
        inter_item_delay: options.inter_item_delay,
        dequeue_timeout,
    };

    info!(worker_count, "Starting worker pool");
    let mut workers = JoinSet::new();
    for worker_id in 0..worker_count {
        if worker_id > 0 && !options.stagger_delay.is_zero() {
            sleep(options.stagger_delay).await;
        }
        workers.spawn(worker_loop(worker_id, context.clone()));
    }
    // Only workers hold senders now; the event stream ends once all are gone
    drop(context);

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Worker task terminated abnormally");
        }
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    let mut taken = HashSet::new();
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Taken(local_index) => {
                taken.insert(local_index);
            }
            WorkerEvent::Settled(outcome) => outcomes.push(outcome),
        }
    }

    let settled: HashSet<usize> = outcomes.iter().map(|o| o.local_index).collect();
    let unsettled: Vec<&WorkItem> = pending
        .iter()
        .filter(|i| !settled.contains(&i.local_index))
        .collect();
    let skipped = unsettled
        .iter()
        .filter(|i| !taken.contains(&i.local_index))
        .count();
    let cancelled = cancel.is_cancelled() && skipped > 0;
    if cancelled {
        info!(remaining = skipped, "Cancellation requested, skipped queued items");
    }

    for item in unsettled {
        let outcome = if taken.contains(&item.local_index) {
            ItemOutcome::failed(
                item,
                FailureCause::Interrupted,
                "Worker stopped before the item settled",
            )
        } else if cancelled {
            ItemOutcome::failed(item, FailureCause::Cancelled, "Batch cancelled before dispatch")
        } else {
            ItemOutcome::failed(
                item,
                FailureCause::Interrupted,
                "Worker pool stopped before the item was dispatched",
            )
        };
        progress.item_settled(&outcome);
        outcomes.push(outcome);
    }

    ConcurrentRun {
        outcomes,
        cancelled,
    }
}

async fn worker_loop(worker_id: usize, ctx: WorkerContext) {
    let mut processed = 0usize;

    loop {
        if ctx.cancel.is_cancelled() {
            debug!(worker_id, "Cancellation observed, worker stopping");
            break;
        }

        let next = {
            let mut queue = ctx.queue.lock().await;
            timeout(ctx.dequeue_timeout, queue.recv()).await
        };
        let item = match next {
            Ok(Some(item)) => item,
            Ok(None) | Err(_) => break,
        };
        // The owner outlives every worker, so sends cannot fail while it listens
        let _ = ctx.events.send(WorkerEvent::Taken(item.local_index));

        let decision = ctx.index.resolve(&item);
        let outcome = ctx
            .processor
            .process(&item, decision, ParentResolution::Root, &ctx.index)
            .await
            .outcome;
        ctx.progress.item_settled(&outcome);
        let _ = ctx.events.send(WorkerEvent::Settled(outcome));
        processed += 1;

        if !ctx.inter_item_delay.is_zero() {
            tokio::select! {
                _ = sleep(ctx.inter_item_delay) => {}
                _ = ctx.cancel.cancelled() => {}
            }
        }
    }

    debug!(worker_id, processed, "Worker finished");
}
