//! Per-agent connection state.
//!
//! Lock order: registry lock, then `state`. `state` is never held across an
//! `.await`. `writer` is held across the socket write and is never acquired
//! while the registry lock or `state` is held.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::SinkExt;
use parking_lot::Mutex;
use serde::Serialize;
use switchyard_core::errors::RelayError;
use switchyard_core::ids::ClientId;
use switchyard_core::wire::Fields;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use crate::codec::AgentCodec;

/// Socket write half as stored in a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

type AgentWriter = FramedWrite<BoxedWriter, AgentCodec>;

/// A `command_result` received from an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub message: String,
    pub data: Fields,
    pub received_at: DateTime<Utc>,
}

struct ConnectionState {
    info: Fields,
    streaming: bool,
    last_active: DateTime<Utc>,
    results: VecDeque<CommandOutcome>,
}

/// A connected agent.
pub struct ClientConnection {
    id: ClientId,
    remote_addr: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    result_capacity: usize,
    state: Mutex<ConnectionState>,
    writer: tokio::sync::Mutex<Option<AgentWriter>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

impl ClientConnection {
    pub fn new(
        id: ClientId,
        remote_addr: Option<SocketAddr>,
        writer: BoxedWriter,
        max_frame_bytes: usize,
        result_capacity: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            remote_addr,
            connected_at: now,
            result_capacity,
            state: Mutex::new(ConnectionState {
                info: Fields::new(),
                streaming: false,
                last_active: now,
                results: VecDeque::new(),
            }),
            writer: tokio::sync::Mutex::new(Some(FramedWrite::new(
                writer,
                AgentCodec::new(max_frame_bytes),
            ))),
            shutdown,
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Record inbound activity. Never moves the timestamp backwards.
    pub fn touch(&self) {
        let mut state = self.state.lock();
        state.last_active = state.last_active.max(Utc::now());
    }

    /// Merge agent-reported metadata; later values win per key.
    pub fn merge_info(&self, data: Fields) {
        self.state.lock().info.extend(data);
    }

    /// Set the streaming flag, returning the previous value.
    pub fn set_streaming(&self, streaming: bool) -> bool {
        std::mem::replace(&mut self.state.lock().streaming, streaming)
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().streaming
    }

    /// Keep the outcome, evicting the oldest beyond the history capacity.
    pub fn record_result(&self, outcome: CommandOutcome) {
        if self.result_capacity == 0 {
            return;
        }
        let mut state = self.state.lock();
        while state.results.len() >= self.result_capacity {
            state.results.pop_front();
        }
        state.results.push_back(outcome);
    }

    /// Recent command results, oldest first.
    pub fn recent_results(&self) -> Vec<CommandOutcome> {
        self.state.lock().results.iter().cloned().collect()
    }

    /// Consistent copy of the mutable state.
    pub fn snapshot(&self) -> ClientSnapshot {
        let state = self.state.lock();
        ClientSnapshot {
            id: self.id.clone(),
            remote_addr: self.remote_addr,
            connected_at: self.connected_at,
            last_active: state.last_active,
            streaming: state.streaming,
            info: state.info.clone(),
        }
    }

    /// Write one encoded command line, holding the write lock for the whole frame.
    ///
    /// Fails with `Closed` once teardown was requested, so writers queued
    /// behind a failed write do not each wait out the deadline.
    pub async fn write_line(&self, line: String, deadline: Duration) -> Result<(), RelayError> {
        let mut guard = self.writer.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(RelayError::Closed(self.id.clone()));
        }
        let writer = guard
            .as_mut()
            .ok_or_else(|| RelayError::Closed(self.id.clone()))?;

        match tokio::time::timeout(deadline, writer.send(line)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RelayError::io(&self.id, &e)),
            Err(_) => Err(RelayError::WriteTimeout {
                client_id: self.id.clone(),
                timeout: deadline,
            }),
        }
    }

    /// Ask the read loop to tear this connection down.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Shut down and drop the write half. Later writes fail with `Closed`.
    pub(crate) async fn close_writer(&self) {
        let taken = self.writer.lock().await.take();
        if let Some(writer) = taken {
            let mut inner = writer.into_inner();
            if let Err(e) = inner.shutdown().await {
                tracing::debug!(client_id = %self.id, error = %e, "Write half shutdown failed");
            }
        }
    }
}

/// Point-in-time copy of one client for listings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSnapshot {
    pub id: ClientId,
    pub remote_addr: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub streaming: bool,
    pub info: Fields,
}

const RESERVED_KEYS: [&str; 5] = ["id", "last_active", "connected_at", "streaming", "remote_addr"];

/// Renders as one flat object: the fixed fields plus the merged info map.
/// Info keys that collide with a fixed field are left out.
impl Serialize for ClientSnapshot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use chrono::SecondsFormat;
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry(
            "last_active",
            &self.last_active.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        map.serialize_entry(
            "connected_at",
            &self.connected_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        map.serialize_entry("streaming", &self.streaming)?;
        if let Some(addr) = self.remote_addr {
            map.serialize_entry("remote_addr", &addr.to_string())?;
        }
        for (key, value) in &self.info {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}
