//! Client identifiers.
//!
//! The server mints one id per accepted agent socket. Ids are not stable
//! across reconnects: the same agent reconnecting gets a fresh id.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PREFIX: &str = "client_";

/// Identifier of one agent connection, `client_<uuidv7>`.
///
/// UUIDv7 is time-ordered, so ids minted later sort later. Ids arriving
/// from operators are taken verbatim; an unknown id simply fails lookup.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Mint the id for a newly accepted connection.
    pub fn new() -> Self {
        Self(format!("{PREFIX}{}", Uuid::now_v7()))
    }

    /// Wrap an id received from outside, e.g. an HTTP path segment.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
