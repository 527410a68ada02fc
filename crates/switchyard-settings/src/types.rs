//! Settings type definitions.
//!
//! Every section is `#[serde(default)]`, so a settings file may name only the
//! keys it wants to change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "agent": { "port": 6000, "write_timeout_ms": 5000 },
///   "logging": { "json": true, "modules": { "switchyard_server": "debug" } }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchyardSettings {
    /// Agent-facing TCP listener.
    pub agent: AgentListenerSettings,
    /// Operator-facing HTTP control surface.
    pub http: HttpSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl SwitchyardSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent.write_timeout_ms == 0 {
            return Err(SettingsError::invalid("agent.write_timeout_ms", "must be positive"));
        }
        if self.agent.max_frame_bytes < 1024 {
            return Err(SettingsError::invalid(
                "agent.max_frame_bytes",
                format!("must be at least 1024, got {}", self.agent.max_frame_bytes),
            ));
        }
        if self.agent.event_capacity == 0 {
            return Err(SettingsError::invalid("agent.event_capacity", "must be positive"));
        }
        if self.logging.level.parse::<Level>().is_err() {
            return Err(SettingsError::invalid(
                "logging.level",
                format!("unknown level {:?}", self.logging.level),
            ));
        }
        for (module, level) in &self.logging.modules {
            if level.parse::<Level>().is_err() {
                return Err(SettingsError::invalid(
                    format!("logging.modules.{module}"),
                    format!("unknown level {level:?}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentListenerSettings {
    pub host: String,
    /// `0` picks a free port.
    pub port: u16,
    /// Deadline for a single command write, in milliseconds.
    pub write_timeout_ms: u64,
    /// Longest accepted inbound line; longer lines are discarded.
    pub max_frame_bytes: usize,
    /// Command results kept per client.
    pub result_history: usize,
    /// Capacity of the relay event broadcast channel.
    pub event_capacity: usize,
}

impl Default for AgentListenerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5555,
            write_timeout_ms: 10_000,
            max_frame_bytes: 1024 * 1024,
            result_history: 32,
            event_capacity: 256,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module levels layered over `level`, keyed by module path.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}
