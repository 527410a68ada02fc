//! Relay server for remote agents.
//!
//! Agents connect over TCP and speak newline-delimited JSON. Operators drive
//! them through a small HTTP API. Every accepted socket is owned by one
//! connection task; the registry only hands out shared references to it.

pub mod api;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod handler;
pub mod listener;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod stream;

pub use client::{ClientConnection, ClientSnapshot, CommandOutcome};
pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use registry::ClientRegistry;
pub use server::{start, AppState, ServerHandle};
pub use shutdown::ShutdownCoordinator;
pub use stream::StreamState;
