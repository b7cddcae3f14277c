//! Relay Error Types

use std::net::SocketAddr;

/// Errors raised while setting up or running a relay session
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Malformed `host:port` argument. Fatal at startup.
    #[error("Invalid address '{input}': {reason}")]
    Config { input: String, reason: String },

    #[error("Failed to resolve proxy host '{host}': {reason}")]
    Resolution { host: String, reason: String },

    #[error("Failed to connect to proxy {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("CONNECT handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Stream error: {source}")]
    Stream {
        #[from]
        source: std::io::Error,
    },
}

/// Ways the proxy can refuse or botch the CONNECT exchange
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("proxy closed the connection before responding")]
    ClosedEarly,

    #[error("malformed status line: {0:?}")]
    MalformedStatus(String),

    #[error("proxy answered with status {0}")]
    Rejected(String),

    #[error("I/O error during handshake: {0}")]
    Io(std::io::Error),
}

impl RelayError {
    pub(crate) fn config(input: &str, reason: impl Into<String>) -> Self {
        RelayError::Config {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
