//! Request/response taxonomy exchanged between the dispatcher and shards,
//! plus the aggregate JSON shape returned to the HTTP front-end.
//!
//! The shard-facing types (`ShardCommand`, `ShardResponse`) carry no
//! channel or task state — they are plain data, cloned into a mailbox
//! message by `skv-core`. The HTTP-facing type (`CacheResponse`) is the
//! wire shape described by the external interface: a mandatory `status`
//! plus command-specific fields.

use std::collections::BTreeMap;

use std::sync::Arc;
use serde::Serialize;

/// One sub-request sent to a single shard's mailbox.
#[derive(Debug, Clone)]
pub enum ShardCommand {
    /// Batch probe: look up each key, touching recency for hits. Missing
    /// keys are silently omitted from the reply.
    Get(Vec<Arc<[u8]>>),
    /// Insert or overwrite each key/value pair, in order.
    Put(Vec<Arc<[u8]>>, Vec<Arc<[u8]>>),
    /// Flush the shard, returning its prior size. Capacity is unchanged.
    DelAll,
    /// Report the shard's current entry count.
    Len,
}

/// A shard's reply to exactly one `ShardCommand`.
#[derive(Debug, Clone)]
pub enum ShardResponse {
    /// Reply to `Get`: parallel vectors of the keys that were present and
    /// their values, in the order they were found.
    Get {
        found_keys: Vec<Arc<[u8]>>,
        found_values: Vec<Arc<[u8]>>,
    },
    /// Reply to `Put`: number of input pairs processed (not the number of
    /// new insertions — overwrites count too).
    Put { count: usize },
    /// Reply to `DelAll`: the shard's size immediately before it was
    /// emptied.
    DelAll { count: usize },
    /// Reply to `Len`: the shard's current size.
    Len { count: usize },
    /// A sub-request could not be processed (e.g. mismatched `Put`
    /// lengths). Shard state is unchanged.
    Error { message: String },
}

/// Top-level status reported to the HTTP front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Error")]
    Error,
}

/// The `message` field is either a single string or a list of strings
/// depending on the command — validation errors and simple confirmations
/// are a string, per-shard error collections and the status probe are a
/// list.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    List(Vec<String>),
}

impl From<String> for MessageBody {
    fn from(text: String) -> Self {
        MessageBody::Text(text)
    }
}

impl From<&str> for MessageBody {
    fn from(text: &str) -> Self {
        MessageBody::Text(text.to_string())
    }
}

impl From<Vec<String>> for MessageBody {
    fn from(items: Vec<String>) -> Self {
        MessageBody::List(items)
    }
}

impl std::fmt::Display for MessageBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageBody::Text(text) => f.write_str(text),
            MessageBody::List(items) => write!(f, "{}", items.join("; ")),
        }
    }
}

/// Aggregate result of a dispatcher-level client command, serialized
/// verbatim as the HTTP response body.
#[derive(Debug, Clone, Serialize)]
pub struct CacheResponse {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<String>>,
}

impl CacheResponse {
    pub fn ok(message: impl Into<MessageBody>) -> Self {
        CacheResponse {
            status: Status::Ok,
            message: Some(message.into()),
            result: None,
            debug: None,
        }
    }

    pub fn ok_with_debug(message: impl Into<MessageBody>, debug: Vec<String>) -> Self {
        CacheResponse {
            status: Status::Ok,
            message: Some(message.into()),
            result: None,
            debug: Some(debug),
        }
    }

    pub fn ok_result(result: BTreeMap<String, String>) -> Self {
        CacheResponse {
            status: Status::Ok,
            message: None,
            result: Some(result),
            debug: None,
        }
    }

    pub fn err(message: impl Into<MessageBody>) -> Self {
        CacheResponse {
            status: Status::Error,
            message: Some(message.into()),
            result: None,
            debug: None,
        }
    }
}
