//! Client side of the MogileFS tracker protocol.
//!
//! A [`Backend`] owns an ordered list of tracker addresses and sends one
//! request at a time, failing over between trackers on transport errors.
//! An `ERR` answer from any tracker is authoritative and ends the request.

pub mod addr;
pub mod backend;
pub mod error;

pub use addr::TrackerAddr;
pub use backend::{Backend, BackendConfig};
pub use error::TrackerError;

use std::time::Duration;

/// Default per-attempt budget for connect + send + receive.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Default connect budget for a preferred alternate address before
/// falling back to the standard one.
pub const DEFAULT_PREFERRED_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);
