//! HTTP CONNECT Protocol Types

use std::fmt;
use std::str::FromStr;

use crate::error::{HandshakeError, RelayError};
use crate::protocol::constants::*;

/// A `host:port` pair, used for both the proxy endpoint and the tunnel target.
///
/// Only canonical decimal ports are accepted, so `Display` reproduces the
/// parsed text exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    /// Create a new host/port pair
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl FromStr for HostPort {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 {
            return Err(RelayError::config(s, "expected exactly one 'host:port' pair"));
        }

        let host = parts[0];
        if host.is_empty() {
            return Err(RelayError::config(s, "host is empty"));
        }

        let port = parts[1]
            .parse::<u16>()
            .map_err(|e| RelayError::config(s, format!("invalid port: {}", e)))?;
        if port == 0 {
            return Err(RelayError::config(s, "port must be between 1 and 65535"));
        }
        if port.to_string() != parts[1] {
            return Err(RelayError::config(s, "port must be plain decimal without sign or leading zeros"));
        }

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// CONNECT request sent to the proxy, one per relay session
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    pub target: HostPort,
}

impl ConnectRequest {
    pub fn new(target: HostPort) -> Self {
        Self { target }
    }

    /// Wire form: request line followed by the empty header terminator, no headers
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "{} {} {}{}{}",
            CONNECT_METHOD, self.target, HTTP_VERSION, CRLF, CRLF
        )
        .into_bytes()
    }
}

/// The parts of the proxy response that the handshake looks at
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub version: String,
    pub code: String,
}

impl StatusLine {
    /// Parse the first chunk read back from the proxy.
    ///
    /// The chunk is split on single spaces, so anything after the status code
    /// (reason phrase, headers, early payload) lands in the trailing tokens and
    /// is ignored.
    pub fn parse(chunk: &[u8]) -> Result<Self, HandshakeError> {
        let text = String::from_utf8_lossy(chunk);
        let tokens: Vec<&str> = text.split(' ').collect();

        if tokens.len() < STATUS_LINE_MIN_TOKENS {
            return Err(HandshakeError::MalformedStatus(
                text.lines().next().unwrap_or_default().to_string(),
            ));
        }

        Ok(Self {
            version: tokens[0].to_string(),
            code: tokens[1].to_string(),
        })
    }

    /// Whether the proxy agreed to open the tunnel
    pub fn is_established(&self) -> bool {
        self.code == STATUS_TUNNEL_ESTABLISHED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_port_parsing() {
        let hp: HostPort = "proxy.local:8080".parse().unwrap();
        assert_eq!(hp.host, "proxy.local");
        assert_eq!(hp.port, 8080);

        let hp: HostPort = "127.0.0.1:1".parse().unwrap();
        assert_eq!(hp, HostPort::new("127.0.0.1", 1));

        let hp: HostPort = "example.com:65535".parse().unwrap();
        assert_eq!(hp.port, 65535);
    }

    #[test]
    fn test_host_port_rejects_malformed() {
        for input in [
            "",
            "example.com",
            "example.com:",
            ":443",
            "a:b:c",
            "::1:443",
            "example.com:http",
            "example.com:0",
            "example.com:65536",
            "example.com:-1",
            "example.com:+443",
            "example.com:0443",
            "example.com: 443",
        ] {
            let result = input.parse::<HostPort>();
            assert!(
                matches!(result, Err(RelayError::Config { .. })),
                "expected config error for {:?}, got {:?}",
                input,
                result
            );
        }
    }

    #[test]
    fn test_host_port_display() {
        let hp = HostPort::new("example.com", 443);
        assert_eq!(hp.to_string(), "example.com:443");
    }

    #[test]
    fn test_connect_request_wire_format() {
        let request = ConnectRequest::new(HostPort::new("example.com", 443));
        assert_eq!(
            request.to_bytes(),
            b"CONNECT example.com:443 HTTP/1.1\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn test_connect_line_carries_target_text() {
        for input in ["example.com:443", "10.0.0.7:8443", "db.internal:5432"] {
            let target: HostPort = input.parse().unwrap();
            assert_eq!(
                ConnectRequest::new(target).to_bytes(),
                format!("CONNECT {} HTTP/1.1\r\n\r\n", input).into_bytes()
            );
        }
    }

    #[test]
    fn test_status_line_established() {
        let status = StatusLine::parse(b"HTTP/1.1 200 Connection established\r\n\r\n").unwrap();
        assert_eq!(status.version, "HTTP/1.1");
        assert_eq!(status.code, "200");
        assert!(status.is_established());
    }

    #[test]
    fn test_status_line_rejected() {
        let status =
            StatusLine::parse(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n").unwrap();
        assert_eq!(status.code, "407");
        assert!(!status.is_established());

        let status = StatusLine::parse(b"HTTP/1.0 403 Forbidden\r\n").unwrap();
        assert!(!status.is_established());
    }

    #[test]
    fn test_status_line_too_short() {
        assert!(matches!(
            StatusLine::parse(b"HTTP/1.1 200\r\n\r\n"),
            Err(HandshakeError::MalformedStatus(_))
        ));
        assert!(matches!(
            StatusLine::parse(b"garbage"),
            Err(HandshakeError::MalformedStatus(_))
        ));
    }

    #[test]
    fn test_status_code_must_match_exactly() {
        // Tab separated, so the second space-delimited token is not "200"
        let status = StatusLine::parse(b"HTTP/1.1\t200 OK extra").unwrap();
        assert!(!status.is_established());

        let status = StatusLine::parse(b"HTTP/1.1 2000 OK\r\n").unwrap();
        assert!(!status.is_established());
    }
}
