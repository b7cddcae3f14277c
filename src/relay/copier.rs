//! One-directional stream copy

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::RelayError;

/// Copy from `src` to `dst` until EOF or the first I/O error, returning the
/// number of bytes forwarded.
///
/// Errors end the copy like EOF does. Neither stream is shut down here; the
/// caller decides when the connections are released.
pub async fn copy_stream<R, W>(src: &mut R, dst: &mut W, buffer_size: usize, label: &str) -> u64
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;

    loop {
        let n = match src.read(&mut buf).await {
            Ok(0) => {
                debug!("{}: source closed after {} bytes", label, total);
                return total;
            }
            Ok(n) => n,
            Err(e) => {
                debug!("{}: {}", label, RelayError::from(e));
                return total;
            }
        };

        if let Err(e) = dst.write_all(&buf[..n]).await {
            debug!("{}: {}", label, RelayError::from(e));
            return total;
        }
        total += n as u64;
    }
}
