//! # WooCommerce Provider
//!
//! Implements `RemoteCatalog` for the WooCommerce REST API v3.
//!
//! ## Overview
//!
//! This crate provides:
//! - Paginated listing of product categories and products
//! - Create calls with payload cleaning (slug, parent, category and image references)
//! - Mapping of WooCommerce error responses to `BridgeError`
//! - Basic consumer key/secret authorization header
//!
//! All traffic goes through an injected `HttpClient`, which owns transport
//! retries and timeouts.

pub mod connector;
pub mod error;
mod payload;
pub mod types;

pub use connector::{WooCommerceConfig, WooCommerceConnector};
pub use error::{Result, WooCommerceError};
