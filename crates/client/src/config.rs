//! Client configuration.
//!
//! Can be built in code or loaded from a JSON file:
//!
//! ```json
//! {
//!   "domain": "media",
//!   "trackers": ["10.0.0.1:7001", "10.0.0.2:7001"],
//!   "readonly": false,
//!   "requestTimeoutMs": 3000
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mogile_storage::StorageConfig;
use mogile_tracker::BackendConfig;

use crate::error::ClientError;

fn default_request_timeout_ms() -> u64 {
    mogile_tracker::DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

fn default_preferred_connect_timeout_ms() -> u64 {
    mogile_tracker::DEFAULT_PREFERRED_CONNECT_TIMEOUT.as_millis() as u64
}

fn default_connect_timeout_ms() -> u64 {
    mogile_storage::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

fn default_transfer_timeout_ms() -> u64 {
    mogile_storage::DEFAULT_TRANSFER_TIMEOUT.as_millis() as u64
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Domain every key belongs to.
    pub domain: String,
    /// Tracker addresses as `host:port`, in failover order.
    pub trackers: Vec<String>,
    /// Reject store, rename and delete before contacting any tracker.
    #[serde(default)]
    pub readonly: bool,
    /// Per-tracker budget for connect + send + receive.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_preferred_connect_timeout_ms")]
    pub preferred_connect_timeout_ms: u64,
    /// Storage-node connect timeout.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Storage-node budget per upload and per download chunk.
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
}

impl ClientConfig {
    /// Configuration with default timeouts.
    pub fn new<S: Into<String>>(
        domain: impl Into<String>,
        trackers: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            domain: domain.into(),
            trackers: trackers.into_iter().map(Into::into).collect(),
            readonly: false,
            request_timeout_ms: default_request_timeout_ms(),
            preferred_connect_timeout_ms: default_preferred_connect_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            transfer_timeout_ms: default_transfer_timeout_ms(),
        }
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Loads configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parses and validates configuration JSON.
    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.domain.trim().is_empty() {
            return Err(ClientError::Config("domain must not be empty".into()));
        }
        if self.trackers.is_empty() {
            return Err(ClientError::Config("at least one tracker is required".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientError::Config("requestTimeoutMs must be positive".into()));
        }
        Ok(())
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            preferred_connect_timeout: Duration::from_millis(self.preferred_connect_timeout_ms),
        }
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            transfer_timeout: Duration::from_millis(self.transfer_timeout_ms),
        }
    }
}
