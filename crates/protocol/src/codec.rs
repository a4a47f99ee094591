//! Request encoding and response decoding.
//!
//! Parameters and fields use form-urlencoding: space becomes `+`, and
//! everything outside `[A-Za-z0-9_,-./\:]` is percent-escaped. Parameters
//! are kept in a [`BTreeMap`] so an encoded line is deterministic.

use std::collections::BTreeMap;
use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Characters left as-is by [`escape`]. Space is handled separately.
const FORM_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b',')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/')
    .remove(b'\\')
    .remove(b':')
    .remove(b' ');

/// Decoded success fields, keyed by field name.
pub type FieldMap = BTreeMap<String, String>;

/// A decoded tracker answer: either success fields or an `ERR` failure.
pub type Reply = Result<FieldMap, TrackerFailure>;

/// A structured `ERR` answer from a tracker.
///
/// Callers branch on [`code`](Self::code) (e.g. `unknown_key`,
/// `domain_not_found`, `key_exists`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct TrackerFailure {
    pub code: String,
    pub message: String,
}

impl TrackerFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A tracker request: a command name plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    command: String,
    params: BTreeMap<String, String>,
}

impl Request {
    /// Creates a request with no parameters.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Adds a parameter only when `value` is present.
    pub fn param_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    /// Merges extra parameters. Existing keys are not overwritten.
    pub fn extend_missing<I, K, V>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        for (k, v) in extra {
            self.params.entry(k.into()).or_insert_with(|| v.to_string());
        }
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Returns a parameter value, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Encodes this request as a newline-terminated wire line.
    pub fn encode(&self) -> String {
        encode(&self.command, &self.params)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)
    }
}

/// Form-urlencodes a single key or value.
pub fn escape(s: &str) -> String {
    utf8_percent_encode(s, FORM_ESCAPE)
        .to_string()
        .replace(' ', "+")
}

/// Reverses [`escape`]. Invalid UTF-8 is replaced rather than rejected.
pub fn unescape(s: &str) -> String {
    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Encodes `command` and `params` as `"<command> k=v&k=v\n"`.
pub fn encode(command: &str, params: &BTreeMap<String, String>) -> String {
    let args = encode_fields(params);
    format!("{command} {args}\n")
}

/// Encodes a field map as `k=v&k=v` without a trailing newline.
pub fn encode_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decodes a `k=v&k=v` string. Pairs without `=` get an empty value.
pub fn decode_fields(s: &str) -> FieldMap {
    s.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (unescape(k), unescape(v)),
            None => (unescape(pair), String::new()),
        })
        .collect()
}

/// Decodes one response line, which must include its trailing `\n`.
///
/// An `OK` line yields `Ok(Ok(fields))`, an `ERR` line yields
/// `Ok(Err(failure))`. Anything else is a [`ProtocolError`].
pub fn decode(line: &str) -> Result<Reply, ProtocolError> {
    let body = line.strip_suffix('\n').ok_or(ProtocolError::Truncated)?;
    let body = body.strip_suffix('\r').unwrap_or(body);

    if let Some(rest) = body.strip_prefix("OK") {
        if rest.is_empty() {
            return Ok(Ok(FieldMap::new()));
        }
        let fields = rest
            .strip_prefix(' ')
            .ok_or_else(|| ProtocolError::Malformed(format!("unexpected response: {body:?}")))?;
        return Ok(Ok(decode_fields(fields)));
    }

    if let Some(rest) = body.strip_prefix("ERR") {
        let rest = rest
            .strip_prefix(' ')
            .ok_or_else(|| ProtocolError::Malformed(format!("unexpected response: {body:?}")))?;
        let (code, description) = rest.split_once(' ').unwrap_or((rest, ""));
        if code.is_empty() {
            return Err(ProtocolError::Malformed("ERR without error code".into()));
        }
        return Ok(Err(TrackerFailure::new(code, unescape(description))));
    }

    Err(ProtocolError::Malformed(format!(
        "unexpected response: {body:?}"
    )))
}
