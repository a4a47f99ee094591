//! Client error types.

use mogile_protocol::ProtocolError;
use mogile_storage::StorageError;
use mogile_tracker::TrackerError;

/// Errors produced by [`Client`](crate::Client) operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A mutating operation on a read-only client. Raised before any
    /// request is sent.
    #[error("{operation} is not allowed on a read-only client")]
    ReadOnly { operation: &'static str },

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// The tracker `ERR` code behind this error, if there is one.
    pub fn failure_code(&self) -> Option<&str> {
        match self {
            Self::Tracker(e) => e.failure_code(),
            Self::Storage(StorageError::Tracker(e)) => e.failure_code(),
            _ => None,
        }
    }

    /// True when the failure was a transport problem (no tracker answered,
    /// or no storage node could be used).
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Tracker(e) => e.is_connectivity(),
            Self::Storage(e) => e.is_connectivity(),
            _ => false,
        }
    }
}
