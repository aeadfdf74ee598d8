//! Pending write operation model
//!
//! A `SyncOperation` records one remote write that could not be confirmed
//! against the API at the time it was made. Operations are immutable once
//! enqueued: the store only ever reads or deletes them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::now_millis;

/// Write verb carried by a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMethod {
    Post,
    Put,
    Delete,
}

impl WriteMethod {
    /// Canonical wire/storage spelling of the verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown write method: {other}"
            ))),
        }
    }
}

/// A write that is waiting to be replayed against the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    /// Store-assigned identifier, monotonically increasing
    pub id: i64,
    /// Remote resource/action identifier (e.g. `patients`)
    pub endpoint: String,
    /// Write verb
    pub method: WriteMethod,
    /// Key-value payload of primitive or array values
    pub payload: Map<String, Value>,
    /// Enqueue timestamp (Unix ms); replay order is ascending on this
    pub created_at: i64,
}

/// A not-yet-persisted operation, before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncOperation {
    pub endpoint: String,
    pub method: WriteMethod,
    pub payload: Map<String, Value>,
    pub created_at: i64,
}

impl NewSyncOperation {
    /// Create a new pending operation stamped with the current time.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        method: WriteMethod,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            payload,
            created_at: now_millis(),
        }
    }
}
