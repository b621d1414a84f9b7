use thiserror::Error;

/// Errors raised while assembling a mirror run, before any item is processed.
#[derive(Error, Debug)]
pub enum Error {
    /// Out-of-range tuning, a bad log filter, or logging initialized twice
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required collaborator (remote catalog, local store) was not injected
    #[error("Missing collaborator {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
