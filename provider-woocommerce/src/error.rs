//! Error types for the WooCommerce provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// WooCommerce provider errors
#[derive(Error, Debug)]
pub enum WooCommerceError {
    /// Request payload rejected before or by the API (HTTP 400)
    #[error("Invalid {entity} data: {message}")]
    InvalidData { entity: String, message: String },

    /// Consumer key lacks read/write permission (HTTP 401/403)
    #[error("Permission denied (status {status}): {message}")]
    PermissionDenied { status: u16, message: String },

    /// The entity already exists remotely
    #[error("{entity} already exists: {message}")]
    Duplicate { entity: String, message: String },

    /// Any other non-success response
    #[error("WooCommerce API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for WooCommerce operations
pub type Result<T> = std::result::Result<T, WooCommerceError>;

impl From<WooCommerceError> for BridgeError {
    fn from(error: WooCommerceError) -> Self {
        match error {
            WooCommerceError::InvalidData { .. } => BridgeError::RemoteRejected {
                status: 400,
                message: error.to_string(),
            },
            WooCommerceError::PermissionDenied { status, .. } => BridgeError::RemoteRejected {
                status,
                message: error.to_string(),
            },
            WooCommerceError::Duplicate { .. } => BridgeError::RemoteDuplicate(error.to_string()),
            WooCommerceError::ApiError { status_code, message } => BridgeError::RemoteRejected {
                status: status_code,
                message,
            },
            WooCommerceError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            WooCommerceError::Bridge(e) => e,
        }
    }
}
