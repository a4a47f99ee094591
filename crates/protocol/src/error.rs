//! Error types for the tracker protocol.

/// Violations of the tracker line protocol.
///
/// These are never authoritative answers from a tracker. A connection that
/// produces one is treated as broken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("response line is not newline-terminated")]
    Truncated,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("missing response field: {0}")]
    MissingField(String),

    #[error("invalid value for field {field}: {value:?}")]
    InvalidField { field: String, value: String },
}
