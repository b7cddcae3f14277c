//! Proxy Address Resolution

use std::net::SocketAddr;
use tokio::net::lookup_host;
use tracing::debug;

use crate::error::RelayError;
use crate::protocol::HostPort;

/// Resolve the proxy endpoint, taking the first address in resolver order
pub async fn resolve(endpoint: &HostPort) -> Result<SocketAddr, RelayError> {
    debug!("Resolving proxy host: {}", endpoint);

    let mut addrs = lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|e| RelayError::Resolution {
            host: endpoint.host.clone(),
            reason: e.to_string(),
        })?;

    match addrs.next() {
        Some(addr) => {
            debug!("Resolved {} to {}", endpoint.host, addr);
            Ok(addr)
        }
        None => Err(RelayError::Resolution {
            host: endpoint.host.clone(),
            reason: "no addresses returned".to_string(),
        }),
    }
}
