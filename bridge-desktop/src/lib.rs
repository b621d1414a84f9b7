//! # Desktop Bridge Implementations
//!
//! Default adapters for running the catalog mirror on a desktop machine.
//!
//! ## Overview
//!
//! - [`ReqwestHttpClient`] implements `HttpClient` with `reqwest`
//! - [`SqliteRecordStore`] implements `LocalStore` over a WAL-mode SQLite pool
//! - [`db`] creates the pool and applies the embedded migrations
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{db, ReqwestHttpClient, SqliteRecordStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http = Arc::new(ReqwestHttpClient::new()?);
//!     let pool = db::create_pool(db::DatabaseConfig::new("catalog.db").max_connections(4)).await?;
//!     let store = Arc::new(SqliteRecordStore::new(pool));
//!     // Hand both to MirrorConfig::builder()
//!     Ok(())
//! }
//! ```

pub mod db;
mod http;
mod store;

pub use http::ReqwestHttpClient;
pub use store::SqliteRecordStore;
