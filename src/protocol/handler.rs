//! HTTP CONNECT Handshake Handler

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{ConnectRequest, HostPort, StatusLine, DEFAULT_HANDSHAKE_BUFFER_SIZE};
use crate::error::{HandshakeError, RelayError};

/// Client side of the CONNECT exchange on an upstream proxy connection
pub struct ConnectHandler<S> {
    stream: S,
    buffer_size: usize,
}

impl<S> ConnectHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new handler for the given proxy stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer_size: DEFAULT_HANDSHAKE_BUFFER_SIZE,
        }
    }

    /// Bound the single response read to `buffer_size` bytes
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Send the request, then read and check the status line.
    ///
    /// Bytes that arrive in the same read after the status line are discarded.
    pub async fn negotiate(&mut self, target: &HostPort) -> Result<StatusLine, HandshakeError> {
        self.send_connect_request(target).await?;
        let status = self.read_status().await?;

        info!("Proxy response code={}", status.code);
        if !status.is_established() {
            return Err(HandshakeError::Rejected(status.code));
        }

        Ok(status)
    }

    /// Write the whole CONNECT request before anything is read
    pub async fn send_connect_request(&mut self, target: &HostPort) -> Result<(), HandshakeError> {
        let request = ConnectRequest::new(target.clone()).to_bytes();
        self.stream
            .write_all(&request)
            .await
            .map_err(HandshakeError::Io)?;
        self.stream.flush().await.map_err(HandshakeError::Io)?;
        debug!("Sent CONNECT request for {}", target);
        Ok(())
    }

    /// Read one chunk from the proxy and parse its status line
    pub async fn read_status(&mut self) -> Result<StatusLine, HandshakeError> {
        let mut buf = vec![0u8; self.buffer_size];
        let n = self
            .stream
            .read(&mut buf)
            .await
            .map_err(HandshakeError::Io)?;

        if n == 0 {
            return Err(HandshakeError::ClosedEarly);
        }

        StatusLine::parse(&buf[..n])
    }

    /// Consume the handler and return the (now transparent) stream
    pub fn into_stream(self) -> S {
        self.stream
    }
}

/// Connect to the proxy and negotiate a tunnel to `target`.
///
/// `connect_timeout` of `None` leaves the connect attempt to the OS timeout.
pub async fn open_tunnel(
    proxy_addr: SocketAddr,
    target: &HostPort,
    connect_timeout: Option<Duration>,
    buffer_size: usize,
) -> Result<TcpStream, RelayError> {
    debug!("Trying to connect to proxy {}", proxy_addr);

    let connect = TcpStream::connect(proxy_addr);
    let stream = match connect_timeout {
        Some(limit) => match timeout(limit, connect).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", limit),
            )),
        },
        None => connect.await,
    }
    .map_err(|source| RelayError::Connect {
        addr: proxy_addr,
        source,
    })?;

    info!("Connected to proxy {}", proxy_addr);

    let mut handler = ConnectHandler::new(stream).with_buffer_size(buffer_size);
    handler.negotiate(target).await?;

    info!("CONNECTED to {}", target);
    Ok(handler.into_stream())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_test::io::Builder;

    fn target() -> HostPort {
        HostPort::new("example.com", 443)
    }

    #[tokio::test]
    async fn test_negotiate_success() {
        let mock = Builder::new()
            .write(b"CONNECT example.com:443 HTTP/1.1\r\n\r\n")
            .read(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .build();

        let mut handler = ConnectHandler::new(mock);
        let status = handler.negotiate(&target()).await.unwrap();
        assert_eq!(status.code, "200");
    }

    #[tokio::test]
    async fn test_negotiate_rejected() {
        let mock = Builder::new()
            .write(b"CONNECT example.com:443 HTTP/1.1\r\n\r\n")
            .read(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
            .build();

        let mut handler = ConnectHandler::new(mock);
        match handler.negotiate(&target()).await {
            Err(HandshakeError::Rejected(code)) => assert_eq!(code, "407"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_negotiate_malformed() {
        let mock = Builder::new()
            .write(b"CONNECT example.com:443 HTTP/1.1\r\n\r\n")
            .read(b"SSH-2.0-OpenSSH\r\n")
            .build();

        let mut handler = ConnectHandler::new(mock);
        assert!(matches!(
            handler.negotiate(&target()).await,
            Err(HandshakeError::MalformedStatus(_))
        ));
    }

    #[tokio::test]
    async fn test_proxy_closes_before_responding() {
        let (client, server) = tokio::io::duplex(1024);
        let proxy = tokio::spawn(async move {
            let mut server = server;
            let mut buf = vec![0u8; 64];
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0);
            // Dropping the server half closes the stream with no response
        });

        let mut handler = ConnectHandler::new(client);
        let result = handler.negotiate(&target()).await;
        proxy.await.unwrap();
        assert!(matches!(result, Err(HandshakeError::ClosedEarly)));
    }

    #[tokio::test]
    async fn test_response_read_is_bounded() {
        let (client, mut server) = tokio::io::duplex(1024);
        server
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\nEARLY-PAYLOAD")
            .await
            .unwrap();

        let mut handler = ConnectHandler::new(client).with_buffer_size(16);
        let status = handler.read_status().await.unwrap();
        assert!(status.is_established());

        // Anything past the first 16 bytes is still unread on the stream
        let mut rest = Vec::new();
        drop(server);
        handler.into_stream().read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"nection established\r\n\r\nEARLY-PAYLOAD".to_vec());
    }

    #[tokio::test]
    async fn test_open_tunnel_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = open_tunnel(addr, &target(), None, DEFAULT_HANDSHAKE_BUFFER_SIZE).await;
        assert!(matches!(result, Err(RelayError::Connect { .. })));
    }
}
