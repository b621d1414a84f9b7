use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Remote service rejected request (status {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Remote entity already exists: {0}")]
    RemoteDuplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Local store is busy: {0}")]
    StoreBusy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether retrying the same call may succeed.
    ///
    /// Only local store lock contention is classified as transient; remote
    /// failures are retried at the transport layer, not by callers.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::StoreBusy(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_busy_is_transient() {
        assert!(BridgeError::StoreBusy("database is locked".into()).is_transient());
        assert!(!BridgeError::DatabaseError("constraint".into()).is_transient());
        assert!(!BridgeError::RemoteRejected {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
    }

    #[test]
    fn test_remote_rejected_display() {
        let err = BridgeError::RemoteRejected {
            status: 400,
            message: "Invalid slug".into(),
        };
        assert_eq!(
            err.to_string(),
            "Remote service rejected request (status 400): Invalid slug"
        );
    }
}
