//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the catalog mirror:
//! - Logging and tracing infrastructure
//! - Configuration management (collaborators and execution tuning)
//!
//! ## Overview
//!
//! Every other crate depends on the conventions established here: `tracing`
//! for structured logs, and a fail-fast [`config::MirrorConfig`] builder that
//! refuses to start a batch engine without its required collaborators.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ExecutionConfig, MirrorConfig, MirrorConfigBuilder};
pub use error::{Error, Result};
