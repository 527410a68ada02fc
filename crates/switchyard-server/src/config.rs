//! Server configuration.

use std::time::Duration;

use switchyard_settings::SwitchyardSettings;

/// Configuration for the relay server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host for the agent listener.
    pub agent_host: String,
    /// Port for the agent listener (`0` for auto-assign).
    pub agent_port: u16,
    /// Host for the HTTP control surface.
    pub http_host: String,
    /// Port for the HTTP control surface (`0` for auto-assign).
    pub http_port: u16,
    /// Deadline for writing one command to an agent.
    pub write_timeout: Duration,
    /// Longest accepted inbound line.
    pub max_frame_bytes: usize,
    /// Command results kept per client.
    pub result_history: usize,
    /// Relay event broadcast capacity.
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            agent_host: "127.0.0.1".into(),
            agent_port: 0,
            http_host: "127.0.0.1".into(),
            http_port: 0,
            write_timeout: Duration::from_secs(10),
            max_frame_bytes: 1024 * 1024,
            result_history: 32,
            event_capacity: 256,
        }
    }
}

impl From<&SwitchyardSettings> for ServerConfig {
    fn from(settings: &SwitchyardSettings) -> Self {
        Self {
            agent_host: settings.agent.host.clone(),
            agent_port: settings.agent.port,
            http_host: settings.http.host.clone(),
            http_port: settings.http.port,
            write_timeout: Duration::from_millis(settings.agent.write_timeout_ms),
            max_frame_bytes: settings.agent.max_frame_bytes,
            result_history: settings.agent.result_history,
            event_capacity: settings.agent.event_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_free_ports() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.agent_host, "127.0.0.1");
        assert_eq!(cfg.agent_port, 0);
        assert_eq!(cfg.http_port, 0);
        assert_eq!(cfg.write_timeout, Duration::from_secs(10));
    }

    #[test]
    fn from_settings() {
        let mut settings = SwitchyardSettings::default();
        settings.agent.port = 6000;
        settings.agent.write_timeout_ms = 2500;
        settings.http.host = "10.0.0.1".into();

        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.agent_host, "0.0.0.0");
        assert_eq!(cfg.agent_port, 6000);
        assert_eq!(cfg.http_host, "10.0.0.1");
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.write_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.result_history, 32);
    }
}
