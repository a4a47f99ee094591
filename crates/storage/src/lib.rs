//! File handles for MogileFS storage nodes.
//!
//! Bytes never pass through a tracker. A [`WriteHandle`] asks the tracker
//! for a write plan (`create_open`), uploads to one destination over HTTP
//! with failover to the backups, and commits with `create_close`. A
//! [`ReadHandle`] asks for replica paths (`get_paths`) and downloads with
//! failover that resumes at the current offset.

pub mod config;
pub mod error;
pub mod paths;
pub mod read;
pub mod write;

pub use config::{Storage, StorageConfig};
pub use error::StorageError;
pub use paths::{GetPathsOptions, Zone, get_paths};
pub use read::ReadHandle;
pub use write::{NewFile, WriteHandle, WriteState};

use std::time::Duration;

/// Default connect timeout for storage nodes.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default budget for one upload, or for each chunk of a download.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of replica paths requested by `get_paths`.
pub const DEFAULT_PATH_COUNT: u32 = 2;
