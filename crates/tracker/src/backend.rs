//! Tracker backend with failover.
//!
//! Candidate order for every request is: the last tracker that answered
//! successfully, then every other configured tracker in configured order.
//! Each candidate gets one attempt bounded by
//! [`BackendConfig::request_timeout`]. Transport failures move on to the
//! next candidate; an `ERR` answer is returned immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use mogile_protocol::{FieldMap, ProtocolError, Reply, Request, decode};

use crate::addr::TrackerAddr;
use crate::error::TrackerError;
use crate::{DEFAULT_PREFERRED_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};

/// Timeouts for tracker requests.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Budget for one attempt against one tracker: connect, send, and
    /// read the response line.
    pub request_timeout: Duration,
    /// Connect budget for a preferred alternate address.
    pub preferred_connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            preferred_connect_timeout: DEFAULT_PREFERRED_CONNECT_TIMEOUT,
        }
    }
}

/// Why one attempt against one tracker failed.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out")]
    Timeout,

    #[error("connection closed by tracker")]
    Closed,

    #[error("{0}")]
    Protocol(#[from] ProtocolError),
}

/// An open connection to one configured tracker.
struct Connection {
    tracker: usize,
    stream: BufReader<TcpStream>,
}

/// Client for a fleet of MogileFS trackers.
///
/// Cloning is cheap and clones share connection state, so requests from
/// all clones are serialized and complete in issue order. Use separate
/// `Backend`s for parallel requests.
#[derive(Clone)]
pub struct Backend {
    trackers: Arc<[TrackerAddr]>,
    config: BackendConfig,
    connection: Arc<tokio::sync::Mutex<Option<Connection>>>,
    last_tracker: Arc<Mutex<Option<usize>>>,
    preferred: Arc<RwLock<HashMap<String, String>>>,
}

impl Backend {
    /// Creates a backend for the given trackers. No connection is opened
    /// until the first request.
    pub fn new(trackers: Vec<TrackerAddr>, config: BackendConfig) -> Result<Self, TrackerError> {
        if trackers.is_empty() {
            return Err(TrackerError::NoTrackers);
        }
        Ok(Self {
            trackers: trackers.into(),
            config,
            connection: Arc::new(tokio::sync::Mutex::new(None)),
            last_tracker: Arc::new(Mutex::new(None)),
            preferred: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Parses `host:port` strings and creates a backend.
    pub fn from_hosts<S: AsRef<str>>(
        hosts: &[S],
        config: BackendConfig,
    ) -> Result<Self, TrackerError> {
        let trackers = hosts
            .iter()
            .map(|h| h.as_ref().parse())
            .collect::<Result<Vec<TrackerAddr>, _>>()?;
        Self::new(trackers, config)
    }

    pub fn trackers(&self) -> &[TrackerAddr] {
        &self.trackers
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Returns the last tracker that answered a request successfully.
    pub fn last_tracker(&self) -> Option<TrackerAddr> {
        let idx = *self.last_tracker.lock().unwrap_or_else(|e| e.into_inner());
        idx.map(|i| self.trackers[i].clone())
    }

    /// Maps a standard tracker host to a preferred alternate host.
    ///
    /// When connecting to `standard`, `preferred` (same port) is tried
    /// first with a short connect timeout, falling back to `standard`.
    pub fn set_preferred_address(
        &self,
        standard: impl Into<String>,
        preferred: impl Into<String>,
    ) {
        self.preferred
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(standard.into(), preferred.into());
    }

    /// Sends one request and returns the success fields.
    pub async fn do_request(&self, request: &Request) -> Result<FieldMap, TrackerError> {
        let mut connection = self.connection.lock().await;
        let line = request.encode();
        let candidates = self.candidate_order();

        let mut attempts = 0;
        let mut last_error = String::new();

        for idx in candidates {
            attempts += 1;
            let tracker = &self.trackers[idx];

            match self.attempt(&mut connection, idx, &line).await {
                Ok(Ok(fields)) => {
                    debug!(%tracker, command = request.command(), "tracker request ok");
                    *self.last_tracker.lock().unwrap_or_else(|e| e.into_inner()) = Some(idx);
                    return Ok(fields);
                }
                Ok(Err(failure)) => {
                    debug!(
                        %tracker,
                        command = request.command(),
                        code = %failure.code,
                        "tracker returned error"
                    );
                    return Err(TrackerError::Application(failure));
                }
                Err(e) => {
                    warn!(
                        %tracker,
                        command = request.command(),
                        error = %e,
                        "tracker attempt failed"
                    );
                    last_error = format!("{tracker}: {e}");
                }
            }
        }

        Err(TrackerError::Unreachable {
            command: request.command().to_string(),
            attempts,
            last_error,
        })
    }

    /// Last successful tracker first, then the rest in configured order.
    fn candidate_order(&self) -> Vec<usize> {
        let last = *self.last_tracker.lock().unwrap_or_else(|e| e.into_inner());
        let mut order = Vec::with_capacity(self.trackers.len());
        if let Some(idx) = last {
            order.push(idx);
        }
        order.extend((0..self.trackers.len()).filter(|i| Some(*i) != last));
        order
    }

    /// One bounded attempt against tracker `idx`. On success the
    /// connection is kept for reuse; on failure it is dropped.
    ///
    /// The request line is written at most once per attempt. A cached
    /// connection is only reused if it still looks open before writing.
    async fn attempt(
        &self,
        slot: &mut Option<Connection>,
        idx: usize,
        line: &str,
    ) -> Result<Reply, AttemptError> {
        let cached = match slot.take() {
            Some(conn) if conn.tracker == idx && is_idle_and_open(&conn.stream) => {
                Some(conn.stream)
            }
            Some(conn) => {
                let tracker = &self.trackers[conn.tracker];
                debug!(%tracker, "dropping cached tracker connection");
                None
            }
            None => None,
        };

        let work = async {
            let mut stream = match cached {
                Some(stream) => stream,
                None => BufReader::new(self.connect(&self.trackers[idx]).await?),
            };
            let reply = exchange(&mut stream, line).await?;
            Ok::<_, AttemptError>((stream, reply))
        };

        let (stream, reply) = tokio::time::timeout(self.config.request_timeout, work)
            .await
            .map_err(|_| AttemptError::Timeout)??;

        *slot = Some(Connection {
            tracker: idx,
            stream,
        });
        Ok(reply)
    }

    /// Connects to a tracker, trying its preferred alternate host first.
    async fn connect(&self, tracker: &TrackerAddr) -> std::io::Result<TcpStream> {
        let preferred = self
            .preferred
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&tracker.host)
            .cloned();

        if let Some(host) = preferred {
            let connect = TcpStream::connect((host.as_str(), tracker.port));
            match tokio::time::timeout(self.config.preferred_connect_timeout, connect).await {
                Ok(Ok(stream)) => {
                    debug!(%tracker, preferred = %host, "connected via preferred address");
                    return Ok(stream);
                }
                Ok(Err(e)) => {
                    debug!(%tracker, preferred = %host, error = %e, "preferred address failed");
                }
                Err(_) => {
                    debug!(%tracker, preferred = %host, "preferred address timed out");
                }
            }
        }

        TcpStream::connect((tracker.host.as_str(), tracker.port)).await
    }
}

/// True when nothing is buffered and the peer has not closed the socket.
///
/// A tracker that closed an idle connection shows up here as EOF, so the
/// connection can be replaced before anything is sent on it.
fn is_idle_and_open(stream: &BufReader<TcpStream>) -> bool {
    if !stream.buffer().is_empty() {
        return false;
    }
    let mut byte = [0u8; 1];
    match stream.get_ref().try_read(&mut byte) {
        Err(e) => e.kind() == std::io::ErrorKind::WouldBlock,
        // EOF, or unsolicited bytes that would desync the next answer.
        Ok(_) => false,
    }
}

/// Writes one request line and reads one response line.
async fn exchange(stream: &mut BufReader<TcpStream>, line: &str) -> Result<Reply, AttemptError> {
    stream.get_mut().write_all(line.as_bytes()).await?;
    stream.get_mut().flush().await?;

    let mut response = String::new();
    let n = stream.read_line(&mut response).await?;
    if n == 0 {
        return Err(AttemptError::Closed);
    }
    Ok(decode(&response)?)
}
