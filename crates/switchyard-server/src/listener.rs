//! Agent accept loop.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::handler::ConnectionHandler;

/// Back-off after a failed accept (e.g. out of file descriptors).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accept agents until `shutdown` fires, then wait for every connection
/// task to finish its cleanup.
pub async fn accept_loop(listener: TcpListener, handler: ConnectionHandler, shutdown: CancellationToken) {
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    tracker.spawn(handler.clone().run(stream, Some(peer)));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept agent connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }

    tracker.close();
    tracing::info!(open = tracker.len(), "Agent listener stopped, draining connections");
    tracker.wait().await;
}
