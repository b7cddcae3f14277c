//! Relay Engine

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, error, info, instrument, warn};

use super::copy_stream;
use super::{ConnectionStats, RelaySession, SessionState};
use crate::config::Config;
use crate::error::RelayError;
use crate::protocol::handler::open_tunnel;
use crate::resolver;

/// Drives relay sessions for accepted client connections
pub struct RelayEngine {
    config: Arc<Config>,
}

impl RelayEngine {
    /// Create a new relay engine from configuration
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Run one client connection from handshake to teardown.
    ///
    /// The client stream is dropped (closed) on every return path.
    #[instrument(skip_all, fields(session_id = %session_id, client = %client_addr))]
    pub async fn run_session(
        &self,
        session_id: String,
        client: TcpStream,
        client_addr: SocketAddr,
    ) -> Result<ConnectionStats, RelayError> {
        info!("Relay session started");
        let mut session = RelaySession::new(session_id, client_addr, self.config.target.clone());

        let tunnel = match self.establish_tunnel(&mut session).await {
            Ok(tunnel) => tunnel,
            Err(e) => {
                session.transition(SessionState::Aborted);
                session.log_stats();
                return Err(e);
            }
        };

        session.transition(SessionState::Relaying);
        let (bytes_up, bytes_down) = self.relay_data(client, tunnel).await;
        session.record_transfer(bytes_up, bytes_down);
        session.transition(SessionState::Closed);

        session.log_stats();
        Ok(session.to_stats())
    }

    /// Resolve the proxy and negotiate the CONNECT tunnel for this session
    async fn establish_tunnel(&self, session: &mut RelaySession) -> Result<TcpStream, RelayError> {
        session.transition(SessionState::Resolving);
        let proxy_addr = resolver::resolve(&self.config.proxy).await?;
        session.proxy_addr = Some(proxy_addr);

        session.transition(SessionState::Handshaking);
        open_tunnel(
            proxy_addr,
            &self.config.target,
            self.config.server.connect_timeout,
            self.config.server.handshake_buffer_size,
        )
        .await
    }

    /// Copy both directions concurrently and wait for both to finish.
    ///
    /// Returns `(bytes_up, bytes_down)`. Each direction hands its halves back
    /// when it ends, so neither connection is closed or half-closed until the
    /// other direction has also stopped.
    pub async fn relay_data<C, T>(&self, client: C, tunnel: T) -> (u64, u64)
    where
        C: AsyncRead + AsyncWrite + Send + 'static,
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let buffer_size = self.config.server.copy_buffer_size;
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut tunnel_read, mut tunnel_write) = tokio::io::split(tunnel);

        let upstream = tokio::spawn(async move {
            let n = copy_stream(&mut client_read, &mut tunnel_write, buffer_size, "client->tunnel").await;
            (client_read, tunnel_write, n)
        });
        let downstream = tokio::spawn(async move {
            let n = copy_stream(&mut tunnel_read, &mut client_write, buffer_size, "tunnel->client").await;
            (tunnel_read, client_write, n)
        });

        let upstream = upstream.await;
        let downstream = downstream.await;

        let bytes_up = match &upstream {
            Ok((_, _, n)) => *n,
            Err(e) => {
                error!("client->tunnel copy task failed: {}", e);
                0
            }
        };
        let bytes_down = match &downstream {
            Ok((_, _, n)) => *n,
            Err(e) => {
                error!("tunnel->client copy task failed: {}", e);
                0
            }
        };

        debug!("Copy tasks done: {} bytes up, {} bytes down", bytes_up, bytes_down);
        drop(upstream);
        drop(downstream);

        (bytes_up, bytes_down)
    }

    /// Log a session failure at a level matching its kind
    pub fn report_failure(session_id: &str, err: &RelayError) {
        match err {
            RelayError::Handshake(_) | RelayError::Resolution { .. } => {
                warn!("Session {} aborted: {}", session_id, err);
            }
            _ => {
                error!("Session {} failed: {}", session_id, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HostPort;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn engine() -> RelayEngine {
        RelayEngine::new(Arc::new(Config::new(
            HostPort::new("127.0.0.1", 8080),
            HostPort::new("example.com", 443),
            9000,
        )))
    }

    #[tokio::test]
    async fn test_relay_data_both_directions() {
        let engine = engine();
        let (client, mut client_peer) = tokio::io::duplex(1024);
        let (tunnel, mut tunnel_peer) = tokio::io::duplex(1024);

        let relay = tokio::spawn(async move { engine.relay_data(client, tunnel).await });

        client_peer.write_all(b"request bytes").await.unwrap();
        let mut buf = [0u8; 13];
        tunnel_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"request bytes");

        tunnel_peer.write_all(b"response").await.unwrap();
        let mut buf = [0u8; 8];
        client_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"response");

        drop(client_peer);
        drop(tunnel_peer);

        let (up, down) = relay.await.unwrap();
        assert_eq!(up, 13);
        assert_eq!(down, 8);
    }

    #[tokio::test]
    async fn test_relay_waits_for_both_directions() {
        let engine = engine();
        let (client, client_peer) = tokio::io::duplex(1024);
        let (tunnel, mut tunnel_peer) = tokio::io::duplex(1024);

        let relay = tokio::spawn(async move { engine.relay_data(client, tunnel).await });

        // Client side hangs up; the tunnel side is still open
        drop(client_peer);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!relay.is_finished());

        // No shutdown was propagated to the tunnel
        let mut buf = [0u8; 1];
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            tunnel_peer.read(&mut buf),
        )
        .await;
        assert!(pending.is_err());

        drop(tunnel_peer);
        let (up, down) = relay.await.unwrap();
        assert_eq!((up, down), (0, 0));
    }
}
