//! MogileFS client.
//!
//! Stores and retrieves blobs by key within one domain. Metadata requests
//! go to the tracker fleet through a [`mogile_tracker::Backend`]; bytes go
//! straight to storage nodes through [`mogile_storage`] file handles.
//!
//! # Operations
//!
//! - **Store**: [`Client::store_content`], [`Client::store_file`], or
//!   [`Client::new_file`] for manual write + close
//! - **Read**: [`Client::get_file_data`], [`Client::read_file`], [`Client::get_paths`]
//! - **Metadata**: [`Client::rename`], [`Client::delete`], [`Client::list_keys`]

pub mod client;
pub mod config;
pub mod error;
pub mod hooks;

pub use client::{Client, ListKeysOptions, NewFileOptions};
pub use config::ClientConfig;
pub use error::ClientError;
pub use hooks::{Hook, HookEvent, Hooks};

// Re-export the types callers handle directly.
pub use mogile_storage::{GetPathsOptions, ReadHandle, WriteHandle, WriteState, Zone};
pub use mogile_tracker::TrackerAddr;
