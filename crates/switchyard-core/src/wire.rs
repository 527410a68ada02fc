//! Agent wire protocol.
//!
//! Agents and the server exchange newline-delimited JSON: one document per
//! line. The server sends [`Command`]s and receives [`Response`]s, which are
//! classified into the typed [`AgentResponse`] before anything acts on them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Bootstrap command sent to every agent right after it connects.
pub const GET_SYSTEM_INFO: &str = "get_system_info";
pub const START_STREAM: &str = "start_stream";
pub const STOP_STREAM: &str = "stop_stream";

pub const STATUS_SYSTEM_INFO: &str = "system_info";
pub const STATUS_COMMAND_RESULT: &str = "command_result";
pub const STATUS_STREAM_DATA: &str = "stream_data";

/// String-to-string map carried by commands and responses.
pub type Fields = BTreeMap<String, String>;

/// A command addressed to one agent.
///
/// Wire form: `{"type": "...", "payload": {"k": "v"}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Fields,
}

impl Command {
    pub fn new(kind: impl Into<String>, payload: Fields) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn system_info() -> Self {
        Self::new(GET_SYSTEM_INFO, Fields::new())
    }

    /// `start_stream` / `stop_stream` with the stream kind (e.g. "screen") in the payload.
    pub fn stream(start: bool, kind: &str) -> Self {
        let tag = if start { START_STREAM } else { STOP_STREAM };
        let mut payload = Fields::new();
        payload.insert("type".to_string(), kind.to_string());
        Self::new(tag, payload)
    }

    /// Encode as a single JSON line without the trailing newline.
    ///
    /// Compact serde_json output never contains a raw newline, so the result
    /// is always exactly one frame.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A response as it appears on the wire.
///
/// Wire form: `{"status": "...", "message": "...", "data": {"k": "v"}}`.
/// `message` and `data` may be missing or null.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Fields,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A response classified by its status tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentResponse {
    /// Host metadata to merge into the client's info map.
    SystemInfo { data: Fields },
    /// Outcome of a previously dispatched command. There is no correlation id,
    /// so it cannot be matched to a specific command.
    CommandResult { message: String, data: Fields },
    /// Media or other streaming payload.
    StreamData { message: String, data: Fields },
    /// Any status the server does not know.
    Unknown { status: String, message: String },
}

impl AgentResponse {
    /// Parse one JSON document into a classified response.
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Response>(line).map(Self::from)
    }

    pub fn status(&self) -> &str {
        match self {
            Self::SystemInfo { .. } => STATUS_SYSTEM_INFO,
            Self::CommandResult { .. } => STATUS_COMMAND_RESULT,
            Self::StreamData { .. } => STATUS_STREAM_DATA,
            Self::Unknown { status, .. } => status,
        }
    }
}

impl From<Response> for AgentResponse {
    fn from(raw: Response) -> Self {
        match raw.status.as_str() {
            STATUS_SYSTEM_INFO => Self::SystemInfo { data: raw.data },
            STATUS_COMMAND_RESULT => Self::CommandResult {
                message: raw.message,
                data: raw.data,
            },
            STATUS_STREAM_DATA => Self::StreamData {
                message: raw.message,
                data: raw.data,
            },
            _ => Self::Unknown {
                status: raw.status,
                message: raw.message,
            },
        }
    }
}
