use serde::{Deserialize, Serialize};

use crate::ids::ClientId;
use crate::wire::Fields;

/// Why a connection's read loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The agent closed its end of the socket.
    Eof,
    /// Reading from the socket failed.
    ReadError,
    /// A dispatched write failed or timed out.
    WriteFailed,
    /// The server is shutting down.
    Shutdown,
}

/// Relay lifecycle events, fanned out over a broadcast channel.
/// Stream payloads reach any external media sink only through here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayEvent {
    #[serde(rename = "client_connected")]
    ClientConnected { client_id: ClientId },

    #[serde(rename = "client_disconnected")]
    ClientDisconnected {
        client_id: ClientId,
        reason: DisconnectReason,
    },

    #[serde(rename = "command_result")]
    CommandResult {
        client_id: ClientId,
        message: String,
        data: Fields,
    },

    #[serde(rename = "stream_data")]
    StreamData {
        client_id: ClientId,
        message: String,
        data: Fields,
    },
}

impl RelayEvent {
    pub fn client_id(&self) -> &ClientId {
        match self {
            Self::ClientConnected { client_id }
            | Self::ClientDisconnected { client_id, .. }
            | Self::CommandResult { client_id, .. }
            | Self::StreamData { client_id, .. } => client_id,
        }
    }
}
