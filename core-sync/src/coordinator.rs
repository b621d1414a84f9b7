//! # Batch Coordinator
//!
//! Entry point of the batch engine.
//!
//! ## Overview
//!
//! The `BatchCoordinator` owns the injected collaborators and execution
//! tuning from a [`MirrorConfig`] and runs one [`WorkPlan`] at a time:
//! - Fetch the remote snapshot once (fatal on error)
//! - Build the name/slug index
//! - Execute the plan dependency-ordered or on a bounded worker pool
//! - Aggregate every item outcome into a [`BatchReport`]
//!
//! ## Workflow
//!
//! 1. Reject concurrent runs of plans with intra-batch parent references
//! 2. Report `(0, total, "Fetching remote snapshot")` and list the remote collection
//! 3. Build the [`RemoteIndex`]
//! 4. Run the chosen executor; per-item failures are folded into outcomes
//! 5. Aggregate and log a summary
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{BatchCoordinator, ConcurrencyOptions, WorkPlan};
//! use core_runtime::MirrorConfig;
//!
//! # async fn example(config: MirrorConfig, plan: WorkPlan) -> core_sync::Result<()> {
//! let coordinator = BatchCoordinator::new(config);
//!
//! // Categories: parents before children
//! let report = coordinator.run_dependency_ordered(plan).await?;
//! println!("{}", report); // "3 created, 1 reused, 0 failed"
//!
//! // Stop dispatching from another task
//! coordinator.cancellation_token().cancel();
//! # Ok(())
//! # }
//! ```

use bridge_traits::{EntityKind, LocalStore, ProgressSink, RemoteCatalog};
use chrono::{DateTime, Utc};
use core_runtime::{ExecutionConfig, MirrorConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::concurrent::{run_concurrent, ConcurrencyOptions};
use crate::error::{Result, SyncError};
use crate::item::ItemOutcome;
use crate::plan::WorkPlan;
use crate::processor::ItemProcessor;
use crate::progress::{ProgressReporter, TracingProgressSink};
use crate::reconcile::RemoteIndex;
use crate::report::BatchReport;
use crate::sequential::run_sequential;
use crate::tracker::StatusTracker;

/// Progress message emitted before the snapshot fetch
pub const SNAPSHOT_PHASE_MESSAGE: &str = "Fetching remote snapshot";

/// How a plan is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// Strict plan order on one task; required when items reference parents
    DependencyOrdered,
    /// Bounded worker pool; items must be independent
    Concurrent(ConcurrencyOptions),
}

pub struct BatchCoordinator {
    catalog: Arc<dyn RemoteCatalog>,
    store: Arc<dyn LocalStore>,
    progress_sink: Arc<dyn ProgressSink>,
    execution: ExecutionConfig,
    cancellation_token: CancellationToken,
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("execution", &self.execution)
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BatchCoordinator {
    /// Build a coordinator from a validated configuration.
    ///
    /// Without a progress sink, updates are logged through `tracing`.
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            catalog: config.remote_catalog,
            store: config.local_store,
            progress_sink: config
                .progress_sink
                .unwrap_or_else(|| Arc::new(TracingProgressSink)),
            execution: config.execution,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Cooperative stop flag shared by every run of this coordinator.
    ///
    /// Cancelling stops new items from being dispatched; items already in
    /// flight settle normally. A cancelled coordinator stays cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn cancel(&self) {
        info!("Cancelling batch coordinator");
        self.cancellation_token.cancel();
    }

    pub fn execution(&self) -> &ExecutionConfig {
        &self.execution
    }

    pub async fn run(&self, plan: WorkPlan, policy: ExecutionPolicy) -> Result<BatchReport> {
        match policy {
            ExecutionPolicy::DependencyOrdered => self.run_dependency_ordered(plan).await,
            ExecutionPolicy::Concurrent(options) => self.run_concurrent(plan, options).await,
        }
    }

    /// Process every item in plan order, resolving parents as they settle.
    #[instrument(skip(self, plan), fields(kind = %plan.kind(), items = plan.len()))]
    pub async fn run_dependency_ordered(&self, plan: WorkPlan) -> Result<BatchReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let kind = plan.kind();

        if plan.is_empty() {
            info!(%run_id, "Empty plan, nothing to mirror");
            return Ok(BatchReport::empty(run_id, kind));
        }

        let progress = Arc::new(ProgressReporter::new(self.progress_sink.clone(), plan.len()));
        let index = self.fetch_index(&plan, &progress).await?;
        let processor = self.processor(&plan);

        info!(%run_id, "Phase 3: Processing items in dependency order");
        let run = run_sequential(
            &processor,
            plan.into_items(),
            index,
            progress.clone(),
            &self.cancellation_token,
        )
        .await;

        Ok(self.finish(run_id, kind, run.outcomes, run.cancelled, started_at, &progress))
    }

    /// Process independent items on a bounded worker pool.
    ///
    /// # Errors
    ///
    /// - [`SyncError::DependentItems`] if any item references a parent
    /// - [`SyncError::Config`] if the worker count is out of range
    /// - [`SyncError::RemoteSnapshot`] if the remote listing fails
    #[instrument(
        skip(self, plan),
        fields(kind = %plan.kind(), items = plan.len(), workers = options.worker_count)
    )]
    pub async fn run_concurrent(
        &self,
        plan: WorkPlan,
        options: ConcurrencyOptions,
    ) -> Result<BatchReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let kind = plan.kind();

        if !plan.is_independent() {
            let count = plan.dependent_count();
            warn!(count, "Rejecting concurrent run of dependent items");
            return Err(SyncError::DependentItems { count });
        }

        self.execution
            .clone()
            .with_worker_count(options.worker_count)
            .validate()?;

        if plan.is_empty() {
            info!(%run_id, "Empty plan, nothing to mirror");
            return Ok(BatchReport::empty(run_id, kind));
        }

        let progress = Arc::new(ProgressReporter::new(self.progress_sink.clone(), plan.len()));
        let index = self.fetch_index(&plan, &progress).await?;
        let processor = Arc::new(self.processor(&plan));

        info!(%run_id, "Phase 3: Processing items on worker pool");
        let run = run_concurrent(
            processor,
            plan.into_items(),
            Arc::new(index),
            progress.clone(),
            self.cancellation_token.clone(),
            options,
            self.execution.dequeue_timeout,
        )
        .await;

        Ok(self.finish(run_id, kind, run.outcomes, run.cancelled, started_at, &progress))
    }

    async fn fetch_index(
        &self,
        plan: &WorkPlan,
        progress: &ProgressReporter,
    ) -> Result<RemoteIndex> {
        let kind = plan.kind();

        info!("Phase 1: Fetching remote {} snapshot", kind);
        progress.phase(SNAPSHOT_PHASE_MESSAGE);
        let entities = self.catalog.list_entities(kind).await.map_err(|e| {
            error!(error = %e, "Remote snapshot fetch failed, aborting batch");
            SyncError::RemoteSnapshot { kind, source: e }
        })?;

        info!("Phase 2: Indexing {} remote entities", entities.len());
        Ok(RemoteIndex::build(entities))
    }

    fn processor(&self, plan: &WorkPlan) -> ItemProcessor {
        let tracker = StatusTracker::from_config(plan.kind(), self.store.clone(), &self.execution);
        ItemProcessor::new(
            plan.kind(),
            self.catalog.clone(),
            tracker,
            self.execution.remote_call_timeout,
        )
    }

    fn finish(
        &self,
        run_id: Uuid,
        kind: EntityKind,
        outcomes: Vec<ItemOutcome>,
        cancelled: bool,
        started_at: DateTime<Utc>,
        progress: &ProgressReporter,
    ) -> BatchReport {
        let report = BatchReport::aggregate(run_id, kind, outcomes, cancelled, started_at);

        info!(
            %run_id,
            created = report.created,
            reused = report.reused,
            failed = report.failed,
            processed = progress.processed(),
            cancelled = report.cancelled,
            "Batch finished: {}",
            report
        );
        for failure in &report.failures {
            warn!(%run_id, "{}", failure);
        }
        report
    }
}
