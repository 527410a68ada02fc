//! Per-agent read loop.
//!
//! Each accepted socket gets one task running [`ConnectionHandler::run`]. The
//! task registers the client, asks it for system metadata, then applies
//! every inbound frame to the client's state until the connection ends.
//! Cleanup happens here and nowhere else.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use switchyard_core::events::{DisconnectReason, RelayEvent};
use switchyard_core::ids::ClientId;
use switchyard_core::wire::{AgentResponse, Command};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::{ClientConnection, CommandOutcome};
use crate::codec::{AgentCodec, Frame};
use crate::dispatch::Dispatcher;
use crate::registry::ClientRegistry;

/// Everything a connection task needs, cloned into each one.
#[derive(Clone)]
pub struct ConnectionHandler {
    registry: Arc<ClientRegistry>,
    dispatcher: Dispatcher,
    events: broadcast::Sender<RelayEvent>,
    max_frame_bytes: usize,
    result_history: usize,
    shutdown: CancellationToken,
}

impl ConnectionHandler {
    pub fn new(
        dispatcher: Dispatcher,
        events: broadcast::Sender<RelayEvent>,
        max_frame_bytes: usize,
        result_history: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry: Arc::clone(dispatcher.registry()),
            dispatcher,
            events,
            max_frame_bytes,
            result_history,
            shutdown,
        }
    }

    /// Serve one agent socket until it closes, a write fails, or the server shuts down.
    pub async fn run<S>(self, stream: S, remote_addr: Option<SocketAddr>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = ClientId::new();
        let span = tracing::info_span!("agent_connection", client_id = %id);
        self.serve(id, stream, remote_addr).instrument(span).await;
    }

    async fn serve<S>(self, id: ClientId, stream: S, remote_addr: Option<SocketAddr>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let conn = Arc::new(ClientConnection::new(
            id.clone(),
            remote_addr,
            Box::new(write_half),
            self.max_frame_bytes,
            self.result_history,
            self.shutdown.child_token(),
        ));

        self.registry.register(Arc::clone(&conn));
        tracing::info!(remote_addr = ?remote_addr, "Agent connected");
        self.publish(RelayEvent::ClientConnected {
            client_id: id.clone(),
        });

        // Hostname, OS and friends are only known once the agent reports them.
        // An agent that never drains its socket must not hold up teardown.
        let bootstrap = Command::system_info();
        tokio::select! {
            biased;
            () = conn.shutdown_token().cancelled() => {}
            sent = self.dispatcher.dispatch(&id, &bootstrap) => {
                if let Err(e) = sent {
                    tracing::warn!(error = %e, "Bootstrap metadata request failed");
                }
            }
        }

        let mut frames = FramedRead::new(read_half, AgentCodec::new(self.max_frame_bytes));
        let reason = loop {
            tokio::select! {
                biased;
                () = conn.shutdown_token().cancelled() => {
                    // Only the dispatcher cancels a connection token on its own.
                    break if self.shutdown.is_cancelled() {
                        DisconnectReason::Shutdown
                    } else {
                        DisconnectReason::WriteFailed
                    };
                }
                frame = frames.next() => match frame {
                    Some(Ok(frame)) => self.apply_frame(&conn, frame),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Read from agent failed");
                        break DisconnectReason::ReadError;
                    }
                    None => break DisconnectReason::Eof,
                },
            }
        };

        self.registry.remove(&id);
        conn.close_writer().await;
        drop(frames);
        tracing::info!(reason = ?reason, "Agent disconnected");
        self.publish(RelayEvent::ClientDisconnected {
            client_id: id,
            reason,
        });
    }

    fn publish(&self, event: RelayEvent) {
        if let Err(broadcast::error::SendError(event)) = self.events.send(event) {
            tracing::trace!(client_id = %event.client_id(), "No relay event subscribers");
        }
    }

    fn apply_frame(&self, conn: &ClientConnection, frame: Frame) {
        conn.touch();
        match frame {
            Frame::Response(response) => self.apply_response(conn, response),
            Frame::Malformed { reason } => {
                tracing::warn!(error = %reason, "Dropping malformed message");
            }
            Frame::Oversized => {
                tracing::warn!(limit = self.max_frame_bytes, "Dropping oversized message");
            }
        }
    }

    fn apply_response(&self, conn: &ClientConnection, response: AgentResponse) {
        match response {
            AgentResponse::SystemInfo { data } => {
                tracing::info!(keys = data.len(), "System info received");
                conn.merge_info(data);
            }
            AgentResponse::CommandResult { message, data } => {
                tracing::info!(result = %message, "Command result received");
                conn.record_result(CommandOutcome {
                    message: message.clone(),
                    data: data.clone(),
                    received_at: Utc::now(),
                });
                self.publish(RelayEvent::CommandResult {
                    client_id: conn.id().clone(),
                    message,
                    data,
                });
            }
            AgentResponse::StreamData { message, data } => {
                tracing::debug!(fields = data.len(), "Stream data received");
                self.publish(RelayEvent::StreamData {
                    client_id: conn.id().clone(),
                    message,
                    data,
                });
            }
            AgentResponse::Unknown { status, .. } => {
                tracing::warn!(status = %status, "Ignoring response with unknown status");
            }
        }
    }
}
