//! Streaming toggle.
//!
//! The server only tracks whether a client was asked to stream and sends the
//! command that flips it. No acknowledgment is awaited and no media passes
//! through here; `stream_data` frames surface as relay events.

use serde::Serialize;
use switchyard_core::errors::RelayError;
use switchyard_core::ids::ClientId;
use switchyard_core::wire::Command;

use crate::dispatch::Dispatcher;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Idle,
    Streaming,
}

impl From<bool> for StreamState {
    fn from(streaming: bool) -> Self {
        if streaming {
            Self::Streaming
        } else {
            Self::Idle
        }
    }
}

impl Dispatcher {
    /// Set the client's streaming flag to `start` and send the matching
    /// `start_stream` / `stop_stream` command.
    ///
    /// Starting an already streaming client leaves the flag as is and sends
    /// the start command again. If the command cannot be written the flag
    /// goes back to its previous value.
    pub async fn toggle_stream(
        &self,
        id: &ClientId,
        start: bool,
        kind: &str,
    ) -> Result<StreamState, RelayError> {
        let conn = self.registry().lookup(id)?;
        let was_streaming = conn.set_streaming(start);
        let previous = StreamState::from(was_streaming);
        let next = StreamState::from(start);

        if let Err(e) = self.dispatch(id, &Command::stream(start, kind)).await {
            conn.set_streaming(was_streaming);
            return Err(e);
        }
        if previous != next {
            tracing::info!(client_id = %id, from = ?previous, to = ?next, kind, "Stream state changed");
        }
        Ok(next)
    }
}
