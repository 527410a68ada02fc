//! # switchyard
//!
//! Relay server binary: loads settings, starts the agent listener and the
//! HTTP control surface, and runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use switchyard_server::ServerConfig;
use switchyard_settings::{LoggingSettings, SwitchyardSettings};
use switchyard_telemetry::TelemetryConfig;

/// How long connection tasks get to finish after Ctrl+C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Agent relay server.
#[derive(Parser, Debug)]
#[command(name = "switchyard", about = "Agent relay server")]
struct Cli {
    /// Settings file (defaults to `~/.switchyard/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent listener port (overrides settings).
    #[arg(long)]
    agent_port: Option<u16>,

    /// HTTP control surface port (overrides settings).
    #[arg(long)]
    http_port: Option<u16>,

    /// Log level, e.g. `debug` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(&self, settings: &mut SwitchyardSettings) {
        if let Some(port) = self.agent_port {
            settings.agent.port = port;
        }
        if let Some(port) = self.http_port {
            settings.http.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match &args.config {
        Some(path) => switchyard_settings::load_settings_from_path(path),
        None => switchyard_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    args.apply(&mut settings);

    switchyard_telemetry::init_telemetry(&telemetry_config(&settings.logging)?)
        .context("Failed to initialize logging")?;

    let config = ServerConfig::from(&settings);
    let handle = switchyard_server::start(config)
        .await
        .context("Failed to start relay server")?;

    tracing::info!(
        agent_port = handle.agent_addr.port(),
        http_port = handle.http_addr.port(),
        "Switchyard ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    if !handle.shutdown(SHUTDOWN_TIMEOUT).await {
        tracing::warn!("Some tasks did not stop in time and were aborted");
    }
    Ok(())
}

fn telemetry_config(logging: &LoggingSettings) -> Result<TelemetryConfig> {
    let parse = |name: &str| {
        switchyard_telemetry::parse_level(name).with_context(|| format!("Unknown log level: {name}"))
    };
    let module_levels = logging
        .modules
        .iter()
        .map(|(module, level)| Ok((module.clone(), parse(level.as_str())?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(TelemetryConfig {
        log_level: parse(logging.level.as_str())?,
        module_levels,
        json: logging.json,
    })
}
