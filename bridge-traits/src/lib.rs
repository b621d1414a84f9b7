//! # Collaborator Bridge Traits
//!
//! Contracts between the batch engine and the world around it.
//!
//! ## Overview
//!
//! The engine in `core-sync` never talks to a network or a database
//! directly. Everything it consumes is expressed here as a trait, and each
//! deployment injects concrete adapters (`bridge-desktop`,
//! `provider-woocommerce`, or test doubles).
//!
//! ## Traits
//!
//! ### Catalog & Storage
//! - [`RemoteCatalog`](catalog::RemoteCatalog) - One listing per batch, one create per new entity
//! - [`LocalStore`](store::LocalStore) - Find/upsert of mirrored records, callable from many workers
//!
//! ### Transport
//! - [`HttpClient`](http::HttpClient) - Async HTTP with transport-level retry
//!
//! ### Host Integration
//! - [`ProgressSink`](progress::ProgressSink) - Non-blocking `(current, total, message)` updates
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to the host
//!
//! ## Error Handling
//!
//! All traits return [`BridgeError`](error::BridgeError). Adapters should map
//! lock contention to [`BridgeError::StoreBusy`] so that
//! [`BridgeError::is_transient`] lets the engine retry the write.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the concurrent executor shares
//! one instance of each across its workers.

pub mod catalog;
pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod store;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{CreateRequest, EntityKind, RemoteCatalog, RemoteEntity, RemoteId};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, TransportRetry};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use progress::{NoopProgressSink, ProgressSink};
pub use store::{LocalStore, PersistedRecord, RecordStatus};
