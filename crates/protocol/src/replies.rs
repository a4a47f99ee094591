//! Typed views over tracker success fields.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::FieldMap;
use crate::error::ProtocolError;

/// One physical write target for a new file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub devid: u64,
    /// Storage-node URL the content is uploaded to.
    pub path: String,
}

/// Parsed `create_open` answer: the tracker-assigned file id and the
/// ordered destination list (primary first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOpenReply {
    pub fid: u64,
    pub destinations: Vec<Destination>,
}

impl CreateOpenReply {
    /// Parses a `create_open` reply.
    ///
    /// Two shapes exist. When `dev_count` is present the destinations are
    /// `devid_1..N` / `path_1..N`; otherwise a single `devid` / `path` pair
    /// is expected. Only field presence decides which shape is read.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, ProtocolError> {
        let fid = parse_field(fields, "fid")?;

        let destinations = if fields.contains_key("dev_count") {
            let count: usize = parse_field(fields, "dev_count")?;
            (1..=count)
                .map(|n| {
                    Ok(Destination {
                        devid: parse_field(fields, &format!("devid_{n}"))?,
                        path: field(fields, &format!("path_{n}"))?.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, ProtocolError>>()?
        } else {
            vec![Destination {
                devid: parse_field(fields, "devid")?,
                path: field(fields, "path")?.to_string(),
            }]
        };

        if destinations.is_empty() {
            return Err(ProtocolError::Malformed(
                "create_open returned no destinations".into(),
            ));
        }

        Ok(Self { fid, destinations })
    }

    /// The first destination in the plan.
    pub fn primary(&self) -> &Destination {
        &self.destinations[0]
    }
}

/// Parses a `get_paths` reply (`paths`, `path1..pathN`) into an ordered
/// list of source URLs.
pub fn parse_paths(fields: &FieldMap) -> Result<Vec<String>, ProtocolError> {
    numbered(fields, "paths", |n| format!("path{n}"))
}

/// Parses a `list_keys` reply (`key_count`, `key_1..key_N`).
pub fn parse_keys(fields: &FieldMap) -> Result<Vec<String>, ProtocolError> {
    numbered(fields, "key_count", |n| format!("key_{n}"))
}

fn numbered(
    fields: &FieldMap,
    count_field: &str,
    name: impl Fn(usize) -> String,
) -> Result<Vec<String>, ProtocolError> {
    let count: usize = parse_field(fields, count_field)?;
    (1..=count)
        .map(|n| field(fields, &name(n)).map(str::to_string))
        .collect()
}

fn field<'a>(fields: &'a FieldMap, name: &str) -> Result<&'a str, ProtocolError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ProtocolError::MissingField(name.to_string()))
}

fn parse_field<T: FromStr>(fields: &FieldMap, name: &str) -> Result<T, ProtocolError> {
    let raw = field(fields, name)?;
    raw.trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidField {
            field: name.to_string(),
            value: raw.to_string(),
        })
}
