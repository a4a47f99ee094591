//! Write handle: buffered upload with destination failover.
//!
//! ```text
//! Open ──close()──▶ Closing ──finalize ack──▶ Closed
//!                      │
//!                      └──no destination / finalize ERR──▶ Failed
//! ```
//!
//! `write` buffers bytes. `close` uploads the whole buffer to the current
//! destination, moving to the next destination in the plan whenever an
//! upload fails (each retry starts from byte zero), then commits with
//! `create_close`. The key's visible content only changes when that
//! commit is acknowledged.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use mogile_protocol::{CreateOpenReply, Destination, Request, commands};
use mogile_tracker::Backend;

use crate::config::Storage;
use crate::error::StorageError;

/// Cap on the buffer pre-allocation taken from a size hint.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Lifecycle of a [`WriteHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Accepting `write` calls.
    Open,
    /// `close` is uploading and finalizing.
    Closing,
    /// The tracker acknowledged the finalize. The content is visible.
    Closed,
    /// No destination accepted the upload, or the finalize was rejected.
    Failed,
}

/// What to create.
#[derive(Debug, Clone, Default)]
pub struct NewFile {
    pub domain: String,
    pub key: String,
    /// Storage class; the domain default when `None`.
    pub class: Option<String>,
    /// Expected size in bytes, used to size the upload buffer.
    pub size_hint: u64,
    /// Extra parameters merged into the `create_close` request.
    pub create_close_params: BTreeMap<String, String>,
}

impl NewFile {
    pub fn new(domain: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn size_hint(mut self, bytes: u64) -> Self {
        self.size_hint = bytes;
        self
    }
}

/// An in-progress upload of one key.
///
/// Always call [`close`](Self::close) and check its result: a handle that
/// is dropped or fails to close leaves the key unchanged.
pub struct WriteHandle {
    backend: Backend,
    storage: Storage,
    file: NewFile,
    fid: u64,
    destinations: Vec<Destination>,
    current: usize,
    buffer: Vec<u8>,
    state: WriteState,
}

impl WriteHandle {
    /// Issues `create_open` and returns a handle for the resulting plan.
    pub async fn open(
        backend: &Backend,
        storage: &Storage,
        file: NewFile,
    ) -> Result<Self, StorageError> {
        let request = Request::new(commands::CREATE_OPEN)
            .param("domain", &file.domain)
            .param("key", &file.key)
            .param("fid", 0)
            .param("multi_dest", 1)
            .param_opt("class", file.class.as_deref());

        let fields = backend.do_request(&request).await?;
        let reply = CreateOpenReply::from_fields(&fields)?;

        debug!(
            key = %file.key,
            fid = reply.fid,
            destinations = reply.destinations.len(),
            "write plan received"
        );

        let capacity = file.size_hint.min(MAX_PREALLOCATION) as usize;
        Ok(Self {
            backend: backend.clone(),
            storage: storage.clone(),
            fid: reply.fid,
            destinations: reply.destinations,
            current: 0,
            buffer: Vec::with_capacity(capacity),
            state: WriteState::Open,
            file,
        })
    }

    pub fn fid(&self) -> u64 {
        self.fid
    }

    pub fn key(&self) -> &str {
        &self.file.key
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    /// Destinations in plan order; the first is the primary.
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// The destination the next upload attempt will go to.
    pub fn current_destination(&self) -> Option<&Destination> {
        self.destinations.get(self.current)
    }

    /// Bytes accepted by `write` so far.
    pub fn bytes_written(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Appends bytes to the upload. Returns the number of bytes accepted.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, StorageError> {
        if self.state != WriteState::Open {
            return Err(StorageError::Closed);
        }
        self.buffer.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Uploads and commits the file.
    ///
    /// Returns the committed size. On error the handle is `Failed` and the
    /// key keeps whatever content it had before.
    pub async fn close(&mut self) -> Result<u64, StorageError> {
        if self.state != WriteState::Open {
            return Err(StorageError::Closed);
        }
        self.state = WriteState::Closing;

        let destination = match self.upload_with_failover().await {
            Ok(dest) => dest,
            Err(e) => {
                self.state = WriteState::Failed;
                return Err(e);
            }
        };

        let size = self.buffer.len() as u64;
        let request = Request::new(commands::CREATE_CLOSE)
            .param("fid", self.fid)
            .param("domain", &self.file.domain)
            .param("key", &self.file.key)
            .param("devid", destination.devid)
            .param("path", &destination.path)
            .param("size", size)
            .param("overwrite", 1)
            .extend_missing(&self.file.create_close_params);

        match self.backend.do_request(&request).await {
            Ok(_) => {
                self.state = WriteState::Closed;
                info!(
                    key = %self.file.key,
                    fid = self.fid,
                    devid = destination.devid,
                    size,
                    "file committed"
                );
                Ok(size)
            }
            Err(e) => {
                self.state = WriteState::Failed;
                warn!(key = %self.file.key, fid = self.fid, error = %e, "finalize failed");
                Err(e.into())
            }
        }
    }

    /// Tries destinations from the current one onward until an upload
    /// succeeds. Returns the destination that holds the content.
    async fn upload_with_failover(&mut self) -> Result<Destination, StorageError> {
        let mut attempts = 0;
        let mut last_error = String::new();

        while let Some(dest) = self.destinations.get(self.current).cloned() {
            attempts += 1;
            match self.upload(&dest).await {
                Ok(()) => return Ok(dest),
                Err(e) => {
                    warn!(
                        key = %self.file.key,
                        devid = dest.devid,
                        path = %dest.path,
                        error = %e,
                        "upload failed, trying next destination"
                    );
                    last_error = format!("devid {}: {e}", dest.devid);
                    self.current += 1;
                }
            }
        }

        Err(StorageError::WriteExhausted {
            attempts,
            last_error,
        })
    }

    async fn upload(&self, dest: &Destination) -> Result<(), StorageError> {
        let send = self
            .storage
            .http()
            .put(&dest.path)
            .body(self.buffer.clone())
            .send();

        let response = tokio::time::timeout(self.storage.transfer_timeout(), send)
            .await
            .map_err(|_| StorageError::Timeout)?
            .map_err(|e| StorageError::Http(format!("PUT {} failed: {e}", dest.path)))?;

        if !response.status().is_success() {
            return Err(StorageError::Http(format!(
                "PUT {} returned status {}",
                dest.path,
                response.status()
            )));
        }

        debug!(devid = dest.devid, bytes = self.buffer.len(), "upload complete");
        Ok(())
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        if self.state == WriteState::Open {
            warn!(
                key = %self.file.key,
                fid = self.fid,
                "write handle dropped without close; nothing was committed"
            );
        }
    }
}
