//! Storage-node HTTP client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_TRANSFER_TIMEOUT};

/// Timeouts for storage-node transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub connect_timeout: Duration,
    /// Budget for one whole upload, and for each chunk of a download.
    pub transfer_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }
}

/// Shared HTTP client for storage nodes. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Storage {
    http: reqwest::Client,
    config: StorageConfig,
}

impl Storage {
    /// Builds a storage client with its own connection pool.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StorageError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Wraps an existing HTTP client.
    pub fn with_client(http: reqwest::Client, config: StorageConfig) -> Self {
        Self { http, config }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub(crate) fn transfer_timeout(&self) -> Duration {
        self.config.transfer_timeout
    }
}
