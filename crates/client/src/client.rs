//! The MogileFS client.

use std::collections::BTreeMap;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use mogile_protocol::{Request, commands, parse_keys};
use mogile_storage::{GetPathsOptions, NewFile, ReadHandle, Storage, WriteHandle};
use mogile_tracker::{Backend, TrackerAddr, TrackerError};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::hooks::{HookEvent, Hooks};

/// Chunk size used when copying from a reader into a write handle.
const COPY_CHUNK: usize = 16 * 1024;

/// Options for [`Client::new_file`].
#[derive(Debug, Clone, Default)]
pub struct NewFileOptions {
    /// Storage class; the domain default when `None`.
    pub class: Option<String>,
    pub size_hint: u64,
    /// Extra parameters merged into the `create_close` request.
    pub create_close_params: BTreeMap<String, String>,
}

impl NewFileOptions {
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            ..Default::default()
        }
    }
}

/// Options for [`Client::list_keys`].
#[derive(Debug, Clone, Default)]
pub struct ListKeysOptions {
    pub prefix: Option<String>,
    /// Return keys strictly after this one. Pass the last key of the
    /// previous page to paginate.
    pub after: Option<String>,
    /// Maximum keys returned; the tracker default when `None`.
    pub limit: Option<u32>,
}

/// Client bound to one domain.
pub struct Client {
    domain: String,
    readonly: bool,
    backend: Backend,
    storage: Storage,
    hooks: Hooks,
}

impl Client {
    /// Builds a client. No network contact happens until the first call.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let backend = Backend::from_hosts(&config.trackers, config.backend_config())?;
        let storage = Storage::new(config.storage_config())?;
        Ok(Self {
            domain: config.domain,
            readonly: config.readonly,
            backend,
            storage,
            hooks: Hooks::new(),
        })
    }

    /// Registers a hook, builder style.
    pub fn with_hook(mut self, hook: impl Fn(&HookEvent) + Send + Sync + 'static) -> Self {
        self.hooks.register(hook);
        self
    }

    /// Registers a hook. Hooks run in registration order.
    pub fn add_hook(&mut self, hook: impl Fn(&HookEvent) + Send + Sync + 'static) {
        self.hooks.register(hook);
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The last tracker that answered a request successfully.
    pub fn last_tracker(&self) -> Option<TrackerAddr> {
        self.backend.last_tracker()
    }

    /// Tries `preferred` before `standard` when connecting to a tracker.
    pub fn set_preferred_address(
        &self,
        standard: impl Into<String>,
        preferred: impl Into<String>,
    ) {
        self.backend.set_preferred_address(standard, preferred);
    }

    /// Starts a new upload for `key`. Nothing is visible until the
    /// returned handle closes successfully.
    pub async fn new_file(
        &self,
        key: &str,
        options: NewFileOptions,
    ) -> Result<WriteHandle, ClientError> {
        self.check_writable("new_file")?;
        self.hooks.run(&HookEvent::NewFileStart {
            key: key.to_string(),
            class: options.class.clone(),
        });

        let class = options.class.clone();
        let file = NewFile {
            domain: self.domain.clone(),
            key: key.to_string(),
            class: options.class,
            size_hint: options.size_hint,
            create_close_params: options.create_close_params,
        };
        let handle = WriteHandle::open(&self.backend, &self.storage, file).await?;

        self.hooks.run(&HookEvent::NewFileEnd {
            key: key.to_string(),
            class,
        });
        Ok(handle)
    }

    /// Stores `content` under `key`. Returns the committed size.
    pub async fn store_content(
        &self,
        key: &str,
        class: Option<&str>,
        content: &[u8],
    ) -> Result<u64, ClientError> {
        self.check_writable("store_content")?;
        let class = class.map(str::to_string);
        self.hooks.run(&HookEvent::StoreContentStart {
            key: key.to_string(),
            class: class.clone(),
        });

        let options = NewFileOptions {
            class: class.clone(),
            size_hint: content.len() as u64,
            ..Default::default()
        };
        let mut fh = self.new_file(key, options).await?;
        fh.write(content)?;
        let size = fh.close().await?;

        self.hooks.run(&HookEvent::StoreContentEnd {
            key: key.to_string(),
            class,
        });
        Ok(size)
    }

    /// Stores everything `reader` yields under `key`. Returns the committed
    /// size.
    ///
    /// If reading fails the upload is abandoned and the key is unchanged.
    pub async fn store_file<R>(
        &self,
        key: &str,
        class: Option<&str>,
        mut reader: R,
    ) -> Result<u64, ClientError>
    where
        R: AsyncRead + Unpin,
    {
        self.check_writable("store_file")?;
        let class = class.map(str::to_string);
        self.hooks.run(&HookEvent::StoreFileStart {
            key: key.to_string(),
            class: class.clone(),
        });

        let options = NewFileOptions {
            class: class.clone(),
            ..Default::default()
        };
        let mut fh = self.new_file(key, options).await?;
        let mut chunk = vec![0u8; COPY_CHUNK];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            fh.write(&chunk[..n])?;
        }
        let size = fh.close().await?;

        self.hooks.run(&HookEvent::StoreFileEnd {
            key: key.to_string(),
            class,
        });
        Ok(size)
    }

    /// Replica URLs for `key`, primary first. Empty when the tracker has
    /// no usable path.
    pub async fn get_paths(
        &self,
        key: &str,
        options: &GetPathsOptions,
    ) -> Result<Vec<String>, ClientError> {
        self.hooks.run(&HookEvent::GetPathsStart {
            key: key.to_string(),
        });
        let paths = mogile_storage::get_paths(&self.backend, &self.domain, key, options).await?;
        self.hooks.run(&HookEvent::GetPathsEnd {
            key: key.to_string(),
        });
        Ok(paths)
    }

    /// Opens `key` for reading. `None` when the key has no paths.
    pub async fn read_file(
        &self,
        key: &str,
        options: &GetPathsOptions,
    ) -> Result<Option<ReadHandle>, ClientError> {
        let paths = self.get_paths(key, options).await?;
        Ok(ReadHandle::from_paths(&self.storage, paths))
    }

    /// Downloads the whole content of `key`. `None` when the key has no
    /// paths.
    pub async fn get_file_data(&self, key: &str) -> Result<Option<Vec<u8>>, ClientError> {
        let Some(mut fh) = self.read_file(key, &GetPathsOptions::default()).await? else {
            return Ok(None);
        };
        let result = fh.read_to_end().await;
        fh.close();
        Ok(Some(result?))
    }

    /// Renames `from` to `to`. Fails with `key_exists` when `to` is taken.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), ClientError> {
        self.check_writable("rename")?;
        let request = Request::new(commands::RENAME)
            .param("domain", &self.domain)
            .param("from_key", from)
            .param("to_key", to);
        self.backend.do_request(&request).await?;
        info!(from, to, "key renamed");
        Ok(())
    }

    /// Deletes `key`.
    pub async fn delete(&self, key: &str) -> Result<(), ClientError> {
        self.check_writable("delete")?;
        let request = Request::new(commands::DELETE)
            .param("domain", &self.domain)
            .param("key", key);
        self.backend.do_request(&request).await?;
        info!(key, "key deleted");
        Ok(())
    }

    /// Lists keys in the domain, in key order.
    ///
    /// A tracker answering `none_match` yields an empty list.
    pub async fn list_keys(&self, options: &ListKeysOptions) -> Result<Vec<String>, ClientError> {
        let request = Request::new(commands::LIST_KEYS)
            .param("domain", &self.domain)
            .param_opt("prefix", options.prefix.as_deref().filter(|p| !p.is_empty()))
            .param_opt("after", options.after.as_deref().filter(|a| !a.is_empty()))
            .param_opt("limit", options.limit);

        match self.backend.do_request(&request).await {
            Ok(fields) => {
                let keys = parse_keys(&fields)?;
                debug!(count = keys.len(), "keys listed");
                Ok(keys)
            }
            Err(TrackerError::Application(failure)) if failure.code == "none_match" => {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Asks the tracker to sleep for `seconds` before answering.
    pub async fn sleep(&self, seconds: u32) -> Result<(), ClientError> {
        let request = Request::new(commands::SLEEP).param("duration", seconds);
        self.backend.do_request(&request).await?;
        Ok(())
    }

    fn check_writable(&self, operation: &'static str) -> Result<(), ClientError> {
        if self.readonly {
            return Err(ClientError::ReadOnly { operation });
        }
        Ok(())
    }
}
