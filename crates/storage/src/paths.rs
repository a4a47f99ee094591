//! Replica path lookup (`get_paths`).

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mogile_protocol::{Request, commands, parse_paths};
use mogile_tracker::{Backend, TrackerError};

use crate::DEFAULT_PATH_COUNT;
use crate::error::StorageError;

/// Network zone hint sent with `get_paths`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Prefer replicas reachable over the alternate network.
    #[default]
    Alt,
    Named(String),
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alt => f.write_str("alt"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Options for `get_paths`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetPathsOptions {
    /// Skip the tracker's check that each path still exists. Faster, but
    /// a stale path then shows up as a read failure instead.
    pub noverify: bool,
    pub zone: Zone,
    /// Maximum number of replica paths returned. `0` means the default (2).
    pub pathcount: u32,
}

impl Default for GetPathsOptions {
    fn default() -> Self {
        Self {
            noverify: true,
            zone: Zone::Alt,
            pathcount: DEFAULT_PATH_COUNT,
        }
    }
}

impl GetPathsOptions {
    pub(crate) fn to_request(&self, domain: &str, key: &str) -> Request {
        let pathcount = if self.pathcount == 0 {
            DEFAULT_PATH_COUNT
        } else {
            self.pathcount
        };
        Request::new(commands::GET_PATHS)
            .param("domain", domain)
            .param("key", key)
            .param("noverify", u8::from(self.noverify))
            .param("zone", &self.zone)
            .param("pathcount", pathcount)
    }
}

/// Asks the tracker where `key` can be read from.
///
/// A tracker `ERR` (unknown key, unknown domain, no usable replica) yields
/// an empty list. Connectivity failures are returned as errors.
pub async fn get_paths(
    backend: &Backend,
    domain: &str,
    key: &str,
    options: &GetPathsOptions,
) -> Result<Vec<String>, StorageError> {
    let request = options.to_request(domain, key);
    match backend.do_request(&request).await {
        Ok(fields) => Ok(parse_paths(&fields)?),
        Err(TrackerError::Application(failure)) => {
            debug!(domain, key, code = %failure.code, "no paths for key");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
