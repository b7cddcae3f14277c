//! Configuration Types

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::protocol::{HostPort, DEFAULT_COPY_BUFFER_SIZE, DEFAULT_HANDSHAKE_BUFFER_SIZE};

/// Main configuration structure, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Upstream HTTP proxy
    pub proxy: HostPort,
    /// Destination named in every CONNECT request
    pub target: HostPort,
    /// Local port to accept clients on
    pub listen_port: u16,
    pub server: ServerConfig,
}

/// Server tunables, loadable from the `[server]` table of a TOML file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    /// Unbounded when unset
    pub max_sessions: Option<usize>,
    pub copy_buffer_size: usize,
    pub handshake_buffer_size: usize,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    pub log_level: String,
}

/// On-disk configuration file layout
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub server: ServerConfig,
}

impl Config {
    /// Build a configuration with default server settings
    pub fn new(proxy: HostPort, target: HostPort, listen_port: u16) -> Self {
        Self {
            proxy,
            target,
            listen_port,
            server: ServerConfig::default(),
        }
    }

    /// Address the acceptor binds to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind_addr, self.listen_port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            max_sessions: None,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            handshake_buffer_size: DEFAULT_HANDSHAKE_BUFFER_SIZE,
            connect_timeout: None,
            log_level: "info".to_string(),
        }
    }
}
