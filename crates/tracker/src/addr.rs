//! Tracker addresses.

use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;

/// A configured tracker `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerAddr {
    pub host: String,
    pub port: u16,
}

impl TrackerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for TrackerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for TrackerAddr {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| TrackerError::InvalidAddress(s.to_string()))?;
        if host.is_empty() {
            return Err(TrackerError::InvalidAddress(s.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| TrackerError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
