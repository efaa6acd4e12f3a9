//! Error hierarchy for the RadioSim relay.
//!
//! - [`RadioError`]: the only error surfaced to callers of `start()`
//! - [`ConfigError`]: invalid start parameters
//! - [`ProtocolError`]: malformed control frame (non-fatal, frame dropped)
//! - [`SessionError`]: per-connection failures, contained in the session

use std::net::SocketAddr;

use thiserror::Error;

/// Top-level error returned by the server lifecycle.
#[derive(Debug, Error)]
pub enum RadioError {
    /// Start parameters were rejected before any socket was touched.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The listening socket could not be resolved, bound, or put into listen mode.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address as supplied by the caller (`host:port`).
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl RadioError {
    /// Build a bind error for `host:port`.
    pub fn bind(host: &str, port: u16, source: std::io::Error) -> Self {
        Self::Bind {
            address: format!("{host}:{port}"),
            source,
        }
    }
}

/// Invalid configuration passed to `start()`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Port is zero or negative.
    #[error("port must be greater than 0, got {0}")]
    NonPositivePort(i64),
    /// Port does not fit in the TCP port range.
    #[error("port {0} is outside the valid range 1-65535")]
    PortOutOfRange(i64),
    /// Port could not be parsed as an integer.
    #[error("port must be an integer, got {0:?}")]
    PortNotInteger(String),
    /// Host is empty.
    #[error("host must not be empty")]
    EmptyHost,
}

/// A control frame that could not be decoded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Tune payload was not valid JSON or lacked a numeric `Frequency`.
    #[error("malformed tune payload: {0}")]
    MalformedTune(#[from] serde_json::Error),
}

/// Failures scoped to a single connection.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Writing a relayed frame to a peer failed; the peer is skipped.
    #[error("delivery to {peer} failed: {source}")]
    PeerDelivery {
        /// Peer address.
        peer: SocketAddr,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Writing to a peer did not complete within the write timeout.
    #[error("delivery to {peer} timed out")]
    PeerTimeout {
        /// Peer address.
        peer: SocketAddr,
    },

    /// The session's own socket failed or was closed by the peer.
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] std::io::Error),
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, RadioError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn config_error_converts_into_radio_error() {
        let err: RadioError = ConfigError::NonPositivePort(0).into();
        assert_matches!(err, RadioError::Config(ConfigError::NonPositivePort(0)));
    }

    #[test]
    fn config_error_display_is_transparent() {
        let err: RadioError = ConfigError::NonPositivePort(-5).into();
        assert_eq!(err.to_string(), "port must be greater than 0, got -5");
    }

    #[test]
    fn bind_error_names_address() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err = RadioError::bind("127.0.0.1", 15100, io);
        assert!(err.to_string().contains("127.0.0.1:15100"));
        assert!(err.to_string().contains("in use"));
    }

    #[test]
    fn protocol_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: ProtocolError = json_err.into();
        assert_matches!(err, ProtocolError::MalformedTune(_));
    }

    #[test]
    fn connection_lost_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: SessionError = io.into();
        assert_matches!(err, SessionError::ConnectionLost(_));
    }

    #[test]
    fn peer_timeout_display() {
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let err = SessionError::PeerTimeout { peer };
        assert_eq!(err.to_string(), "delivery to 127.0.0.1:4000 timed out");
    }
}
