//! Wire protocol for talking to MogileFS trackers.
//!
//! Trackers speak a line-oriented protocol over TCP. Every request is one
//! line, every response is one line:
//!
//! ```text
//! REQUEST:  <command> <form-urlencoded params>\n
//! SUCCESS:  OK <form-urlencoded fields>\n
//! FAILURE:  ERR <code> <description>\n
//! ```
//!
//! See [`codec`] for encoding and decoding, and [`replies`] for turning
//! decoded field maps into typed write and read plans.

pub mod codec;
pub mod commands;
pub mod error;
pub mod replies;

pub use codec::{FieldMap, Reply, Request, TrackerFailure, decode, encode};
pub use error::ProtocolError;
pub use replies::{CreateOpenReply, Destination, parse_keys, parse_paths};
