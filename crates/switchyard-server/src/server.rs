use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use switchyard_core::events::RelayEvent;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::api;
use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::handler::ConnectionHandler;
use crate::listener;
use crate::registry::ClientRegistry;
use crate::shutdown::ShutdownCoordinator;

/// Shared state passed to the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(registry: Arc<ClientRegistry>, write_timeout: Duration) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&registry), write_timeout);
        Self {
            registry,
            dispatcher,
        }
    }
}

/// Bind both listeners and start serving. Returns a handle to shut it down.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(ClientRegistry::new());
    let state = AppState::new(Arc::clone(&registry), config.write_timeout);
    let (events, _) = broadcast::channel(config.event_capacity);
    let mut coordinator = ShutdownCoordinator::new();

    let agent_listener = TcpListener::bind((config.agent_host.as_str(), config.agent_port)).await?;
    let agent_addr = agent_listener.local_addr()?;
    let http_listener = TcpListener::bind((config.http_host.as_str(), config.http_port)).await?;
    let http_addr = http_listener.local_addr()?;

    let handler = ConnectionHandler::new(
        state.dispatcher.clone(),
        events.clone(),
        config.max_frame_bytes,
        config.result_history,
        coordinator.token(),
    );
    coordinator.track(
        "agent_listener",
        tokio::spawn(listener::accept_loop(agent_listener, handler, coordinator.token())),
    );

    let router = api::router(state);
    let http_token = coordinator.token();
    let http = tokio::spawn(async move {
        let result = axum::serve(http_listener, router)
            .with_graceful_shutdown(http_token.cancelled_owned())
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "HTTP server failed");
        }
    });

    coordinator.track("http", http);

    tracing::info!(agent_addr = %agent_addr, http_addr = %http_addr, "Relay server started");

    Ok(ServerHandle {
        agent_addr,
        http_addr,
        registry,
        events,
        coordinator,
    })
}

/// Handle returned by [`start`]; keeps background tasks alive.
pub struct ServerHandle {
    pub agent_addr: SocketAddr,
    pub http_addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    events: broadcast::Sender<RelayEvent>,
    coordinator: ShutdownCoordinator,
}

impl ServerHandle {
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Subscribe to connection, result and stream events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    /// Stop accepting, close every agent connection and wait up to
    /// `timeout` for cleanup. Returns `false` if tasks had to be aborted.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        let drained = self.coordinator.graceful_shutdown(timeout).await;
        tracing::info!(remaining = self.registry.count(), drained, "Relay server stopped");
        drained
    }
}
