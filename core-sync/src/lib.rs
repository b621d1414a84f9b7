//! # Batch Mirror Engine
//!
//! Mirrors a locally staged catalog onto a remote commerce service.
//!
//! ## Overview
//!
//! A batch run takes a [`WorkPlan`] of one entity kind and:
//! - Fetches the remote collection once and indexes it by name and slug
//! - Reuses any entity that already exists, creates the rest
//! - Persists every settled item to the local mirror, retrying store contention
//! - Returns a [`BatchReport`] accounting for every item, even on total failure
//!
//! ## Components
//!
//! - **Work Items** (`item`): the item model and per-item outcomes
//! - **Work Plan** (`plan`): tree/flat/outline input flattened into ordered items
//! - **Reconciliation** (`reconcile`): name/slug index and reuse-or-create decisions
//! - **Executors** (`sequential`, `concurrent`): dependency-ordered and bounded-pool runs
//! - **Status Tracker** (`tracker`): local persistence with bounded retry
//! - **Retry** (`retry`): backoff loop driven by a transient-error predicate
//! - **Batch Coordinator** (`coordinator`): the public entry point

mod concurrent;
pub mod coordinator;
pub mod error;
pub mod item;
pub mod plan;
mod processor;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod retry;
mod sequential;
pub mod tracker;

pub use concurrent::ConcurrencyOptions;
pub use coordinator::{BatchCoordinator, ExecutionPolicy, SNAPSHOT_PHASE_MESSAGE};
pub use error::{PersistError, PlanError, Result, SyncError};
pub use item::{FailureCause, ItemOutcome, ItemStatus, WorkItem};
pub use plan::{parse_outline, slugify, CategoryNode, PlanEntry, WorkPlan};
pub use progress::TracingProgressSink;
pub use reconcile::{build_index, resolve, RemoteIndex, ResolutionDecision};
pub use report::BatchReport;
pub use retry::{retry_with_backoff, Backoff, RetryError, RetryPolicy};
pub use tracker::StatusTracker;
