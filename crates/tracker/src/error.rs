//! Error types for tracker requests.

use mogile_protocol::{ProtocolError, TrackerFailure};

/// Errors produced by [`Backend`](crate::Backend) requests.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// No configured tracker produced a response.
    #[error("no tracker answered {command} after {attempts} attempt(s): {last_error}")]
    Unreachable {
        command: String,
        attempts: usize,
        last_error: String,
    },

    /// A tracker answered with `ERR`. Never retried.
    #[error("tracker error {0}")]
    Application(#[from] TrackerFailure),

    /// A success reply was missing or had invalid fields.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no trackers configured")]
    NoTrackers,

    #[error("invalid tracker address: {0}")]
    InvalidAddress(String),
}

impl TrackerError {
    /// True for transport-level failures (as opposed to tracker answers).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// The tracker error code, for `ERR` answers.
    pub fn failure_code(&self) -> Option<&str> {
        match self {
            Self::Application(failure) => Some(&failure.code),
            _ => None,
        }
    }
}
