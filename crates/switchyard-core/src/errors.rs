use std::time::Duration;

use crate::ids::ClientId;

/// Errors surfaced by registry lookups and command dispatch.
///
/// Inbound decode failures are not represented here: they are logged by the
/// read loop and the offending frame is dropped.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("client not found: {0}")]
    NotFound(ClientId),
    #[error("failed to encode command: {0}")]
    Encode(String),
    #[error("write to {client_id} failed: {message}")]
    Io { client_id: ClientId, message: String },
    #[error("write to {client_id} timed out after {timeout:?}")]
    WriteTimeout { client_id: ClientId, timeout: Duration },
    #[error("connection {0} is closed")]
    Closed(ClientId),
}

impl RelayError {
    pub fn io(client_id: &ClientId, err: &std::io::Error) -> Self {
        Self::Io {
            client_id: client_id.clone(),
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Write-side failures after which the connection should be torn down.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::WriteTimeout { .. })
    }

    /// Short classification string for logging and API bodies.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Encode(_) => "encode",
            Self::Io { .. } => "io",
            Self::WriteTimeout { .. } => "write_timeout",
            Self::Closed(_) => "closed",
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Encode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        let err = RelayError::NotFound(ClientId::from_raw("unknown-id"));
        assert!(err.is_not_found());
        assert!(!err.is_connection_failure());
        assert_eq!(err.error_kind(), "not_found");
        assert_eq!(err.to_string(), "client not found: unknown-id");
    }

    #[test]
    fn write_failures_are_connection_failures() {
        let id = ClientId::from_raw("c1");
        let io = RelayError::io(&id, &std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(io.is_connection_failure());
        assert_eq!(io.error_kind(), "io");

        let timeout = RelayError::WriteTimeout {
            client_id: id.clone(),
            timeout: Duration::from_secs(10),
        };
        assert!(timeout.is_connection_failure());
        assert!(timeout.to_string().contains("timed out"));

        assert!(!RelayError::Closed(id).is_connection_failure());
    }

    #[test]
    fn serde_error_converts_to_encode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: RelayError = json_err.into();
        assert_eq!(err.error_kind(), "encode");
    }
}
