//! Read handle: streamed download with offset-preserving failover.
//!
//! A download streams from the current source path. When a fetch or a
//! chunk fails, the handle drops that response and re-fetches from the
//! next path with `Range: bytes=<offset>-`, so the caller sees one
//! contiguous stream. Sources that ignore the range (answering `200`)
//! have the leading bytes skipped locally.

use reqwest::StatusCode;
use reqwest::header::RANGE;
use tracing::{debug, warn};

use mogile_tracker::Backend;

use crate::config::Storage;
use crate::error::StorageError;
use crate::paths::{GetPathsOptions, get_paths};

/// An in-flight response and its unread bytes.
struct Active {
    response: reqwest::Response,
    pending: Vec<u8>,
    /// Bytes still to discard from a response that ignored the range.
    skip: u64,
    eof: bool,
}

/// An open download of one key.
pub struct ReadHandle {
    storage: Storage,
    paths: Vec<String>,
    current: usize,
    offset: u64,
    active: Option<Active>,
    closed: bool,
}

impl ReadHandle {
    /// Looks up replica paths for `key` and opens a handle over them.
    ///
    /// Returns `None` when the tracker knows no usable path for the key.
    pub async fn open(
        backend: &Backend,
        storage: &Storage,
        domain: &str,
        key: &str,
        options: &GetPathsOptions,
    ) -> Result<Option<Self>, StorageError> {
        let paths = get_paths(backend, domain, key, options).await?;
        Ok(Self::from_paths(storage, paths))
    }

    /// Opens a handle over known source paths, primary first.
    pub fn from_paths(storage: &Storage, paths: Vec<String>) -> Option<Self> {
        if paths.is_empty() {
            return None;
        }
        Some(Self {
            storage: storage.clone(),
            paths,
            current: 0,
            offset: 0,
            active: None,
            closed: false,
        })
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// The path currently read from, or `None` once every path failed.
    pub fn current_path(&self) -> Option<&str> {
        self.paths.get(self.current).map(String::as_str)
    }

    /// Logical position of the next byte returned by [`read`](Self::read).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Moves the logical position. The next read fetches from `offset`.
    pub fn seek(&mut self, offset: u64) {
        if offset != self.offset || self.active.as_ref().is_some_and(|a| a.eof) {
            self.active = None;
        }
        self.offset = offset;
    }

    /// Reads up to `max_bytes`. An empty result means end of file.
    pub async fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        if max_bytes == 0 {
            return Ok(Vec::new());
        }

        let mut attempts = 0;
        let mut last_error = String::new();
        loop {
            let Some(path) = self.paths.get(self.current).cloned() else {
                return Err(StorageError::ReadExhausted {
                    attempts,
                    last_error,
                });
            };

            if self.active.is_none() {
                match self.fetch(&path).await {
                    Ok(active) => self.active = Some(active),
                    Err(e) => {
                        warn!(
                            %path,
                            offset = self.offset,
                            error = %e,
                            "fetch failed, trying next path"
                        );
                        attempts += 1;
                        last_error = format!("{path}: {e}");
                        self.current += 1;
                        continue;
                    }
                }
            }

            let timeout = self.storage.transfer_timeout();
            let Some(active) = self.active.as_mut() else {
                continue;
            };
            match active.next_bytes(max_bytes, timeout).await {
                Ok(bytes) => {
                    self.offset += bytes.len() as u64;
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(
                        %path,
                        offset = self.offset,
                        error = %e,
                        "read failed mid-stream, trying next path"
                    );
                    attempts += 1;
                    last_error = format!("{path}: {e}");
                    self.active = None;
                    self.current += 1;
                }
            }
        }
    }

    /// Reads from the current offset to the end of the file.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, StorageError> {
        let mut out = Vec::new();
        loop {
            let chunk = self.read(64 * 1024).await?;
            if chunk.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
        }
    }

    /// Releases the storage-node connection. Further reads fail.
    pub fn close(&mut self) {
        self.active = None;
        self.closed = true;
    }

    async fn fetch(&self, path: &str) -> Result<Active, StorageError> {
        let mut request = self.storage.http().get(path);
        if self.offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", self.offset));
        }

        let response = tokio::time::timeout(self.storage.transfer_timeout(), request.send())
            .await
            .map_err(|_| StorageError::Timeout)?
            .map_err(|e| StorageError::Http(format!("GET {path} failed: {e}")))?;

        let status = response.status();
        let (skip, eof) = match status {
            StatusCode::PARTIAL_CONTENT => (0, false),
            StatusCode::OK => (self.offset, false),
            // The offset is at or past the end of the file.
            StatusCode::RANGE_NOT_SATISFIABLE => (0, true),
            _ => {
                return Err(StorageError::Http(format!(
                    "GET {path} returned status {status}"
                )));
            }
        };

        debug!(path, offset = self.offset, %status, "fetch started");
        Ok(Active {
            response,
            pending: Vec::new(),
            skip,
            eof,
        })
    }
}

impl Active {
    async fn next_bytes(
        &mut self,
        max: usize,
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>, StorageError> {
        loop {
            if !self.pending.is_empty() {
                let n = max.min(self.pending.len());
                return Ok(self.pending.drain(..n).collect());
            }
            if self.eof {
                return Ok(Vec::new());
            }

            let chunk = tokio::time::timeout(timeout, self.response.chunk())
                .await
                .map_err(|_| StorageError::Timeout)?
                .map_err(|e| StorageError::Http(format!("body read failed: {e}")))?;

            let Some(chunk) = chunk else {
                self.eof = true;
                continue;
            };

            let mut data = &chunk[..];
            if self.skip > 0 {
                let n = (self.skip as usize).min(data.len());
                data = &data[n..];
                self.skip -= n as u64;
            }
            self.pending.extend_from_slice(data);
        }
    }
}
