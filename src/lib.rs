//! httpconnect Library
//! 
//! Local TCP forwarder that carries every accepted connection to one fixed
//! target through an upstream HTTP CONNECT proxy.

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod resolver;
pub mod resource;
pub mod shutdown;

pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{HandshakeError, RelayError};
pub use protocol::HostPort;
pub use resource::ResourceManager;
pub use shutdown::ShutdownCoordinator;

/// Common error type for startup and configuration plumbing
pub type Result<T> = anyhow::Result<T>;
