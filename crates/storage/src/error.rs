//! Error types for storage transfers.

use mogile_protocol::ProtocolError;
use mogile_tracker::TrackerError;

/// Errors produced by file handles.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Every destination in the write plan failed. Nothing was committed.
    #[error("all {attempts} destination(s) failed: {last_error}")]
    WriteExhausted { attempts: usize, last_error: String },

    /// Every source path failed.
    #[error("all {attempts} source path(s) failed: {last_error}")]
    ReadExhausted { attempts: usize, last_error: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("transfer timed out")]
    Timeout,

    #[error("file handle is closed")]
    Closed,
}

impl StorageError {
    /// True when a transfer or tracker request failed for transport
    /// reasons rather than because of an authoritative answer.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Tracker(e) => e.is_connectivity(),
            Self::WriteExhausted { .. }
            | Self::ReadExhausted { .. }
            | Self::Http(_)
            | Self::Timeout => true,
            Self::Protocol(_) | Self::Closed => false,
        }
    }
}
