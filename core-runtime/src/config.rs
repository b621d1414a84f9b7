//! # Mirror Configuration Module
//!
//! Provides configuration management for the catalog mirror engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`MirrorConfig`] holding the injected collaborators and the execution
//! tuning used by the batch engine. It enforces fail-fast validation so a
//! misconfigured engine is rejected before any batch starts.
//!
//! ## Required Dependencies
//!
//! - `RemoteCatalog` - the remote service entities are mirrored to
//! - `LocalStore` - where per-item outcomes are persisted
//!
//! ## Optional Dependencies
//!
//! - `ProgressSink` - receives `(current, total, message)` updates
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ExecutionConfig, MirrorConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = MirrorConfig::builder()
//!     .remote_catalog(Arc::new(connector))
//!     .local_store(Arc::new(store))
//!     .execution(ExecutionConfig::default().with_worker_count(4))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Missing collaborators produce [`Error::CapabilityMissing`] with an
//! actionable message; out-of-range tuning produces [`Error::Config`].

use crate::error::{Error, Result};
use bridge_traits::{LocalStore, ProgressSink, RemoteCatalog};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on concurrent workers
pub const MAX_WORKER_COUNT: usize = 32;

/// Tuning for the batch executors.
///
/// Defaults mirror what a single small shop tolerates: three workers, one
/// second between a worker's successive items, and three write attempts
/// spaced 300 ms apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Number of concurrent workers (1..=32)
    pub worker_count: usize,

    /// Pause applied by each worker between its own successive items
    pub inter_item_delay: Duration,

    /// Pause between starting successive workers
    pub stagger_delay: Duration,

    /// How long an idle worker waits on an empty queue before exiting
    pub dequeue_timeout: Duration,

    /// Upper bound on a single remote create call; `None` disables the timer
    pub remote_call_timeout: Option<Duration>,

    /// Attempts for a local store write, including the first
    pub write_retry_attempts: u32,

    /// Linear backoff unit between write attempts
    pub write_retry_base_delay: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            inter_item_delay: Duration::from_secs(1),
            stagger_delay: Duration::ZERO,
            dequeue_timeout: Duration::from_millis(500),
            remote_call_timeout: Some(Duration::from_secs(60)),
            write_retry_attempts: 3,
            write_retry_base_delay: Duration::from_millis(300),
        }
    }
}

impl ExecutionConfig {
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_inter_item_delay(mut self, delay: Duration) -> Self {
        self.inter_item_delay = delay;
        self
    }

    pub fn with_stagger_delay(mut self, delay: Duration) -> Self {
        self.stagger_delay = delay;
        self
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    pub fn with_remote_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.remote_call_timeout = timeout;
        self
    }

    pub fn with_write_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.write_retry_attempts = attempts;
        self.write_retry_base_delay = base_delay;
        self
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKER_COUNT {
            return Err(Error::Config(format!(
                "Worker count must be between 1 and {}, got {}",
                MAX_WORKER_COUNT, self.worker_count
            )));
        }

        if self.dequeue_timeout.is_zero() {
            return Err(Error::Config(
                "Dequeue timeout must be greater than 0ms".to_string(),
            ));
        }

        if self.remote_call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Config(
                "Remote call timeout must be greater than 0ms; use None to disable it"
                    .to_string(),
            ));
        }

        if self.write_retry_attempts == 0 {
            return Err(Error::Config(
                "Write retry attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Collaborators and tuning for one batch engine.
///
/// Use [`MirrorConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct MirrorConfig {
    pub remote_catalog: Arc<dyn RemoteCatalog>,
    pub local_store: Arc<dyn LocalStore>,
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
    pub execution: ExecutionConfig,
}

impl std::fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("remote_catalog", &"RemoteCatalog { ... }")
            .field("local_store", &"LocalStore { ... }")
            .field(
                "progress_sink",
                &self.progress_sink.as_ref().map(|_| "ProgressSink { ... }"),
            )
            .field("execution", &self.execution)
            .finish()
    }
}

impl MirrorConfig {
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }
}

/// Builder for constructing [`MirrorConfig`] instances.
#[derive(Default)]
pub struct MirrorConfigBuilder {
    remote_catalog: Option<Arc<dyn RemoteCatalog>>,
    local_store: Option<Arc<dyn LocalStore>>,
    progress_sink: Option<Arc<dyn ProgressSink>>,
    execution: Option<ExecutionConfig>,
}

impl MirrorConfigBuilder {
    pub fn remote_catalog(mut self, catalog: Arc<dyn RemoteCatalog>) -> Self {
        self.remote_catalog = Some(catalog);
        self
    }

    pub fn local_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    /// Default: [`ExecutionConfig::default`]
    pub fn execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = Some(execution);
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] if the remote catalog or local store is missing
    /// - [`Error::Config`] if the execution tuning is out of range
    pub fn build(self) -> Result<MirrorConfig> {
        let remote_catalog = self.remote_catalog.ok_or_else(|| Error::CapabilityMissing {
            capability: "RemoteCatalog".to_string(),
            message: "A RemoteCatalog implementation is required to list and create entities. \
                      Desktop: wrap ReqwestHttpClient in a WooCommerceConnector. \
                      Tests: inject an in-memory catalog."
                .to_string(),
        })?;

        let local_store = self.local_store.ok_or_else(|| Error::CapabilityMissing {
            capability: "LocalStore".to_string(),
            message: "A LocalStore implementation is required to persist item outcomes. \
                      Desktop: use SqliteRecordStore over bridge_desktop::db::create_pool."
                .to_string(),
        })?;

        let execution = self.execution.unwrap_or_default();
        execution.validate()?;

        Ok(MirrorConfig {
            remote_catalog,
            local_store,
            progress_sink: self.progress_sink,
            execution,
        })
    }
}
