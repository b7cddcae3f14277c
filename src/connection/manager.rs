//! Connection Manager Implementation

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::relay::RelayEngine;
use crate::resource::{ResourceManager, ResourceSnapshot};
use crate::Result;

/// Accepts client connections and launches one relay session per connection
pub struct ConnectionManager {
    listener: TcpListener,
    local_addr: SocketAddr,
    engine: Arc<RelayEngine>,
    resource_manager: Arc<ResourceManager>,
    next_session_id: AtomicUsize,
}

impl ConnectionManager {
    /// Bind the listening socket described by `config`
    pub async fn bind(config: Arc<Config>) -> Result<Self> {
        let bind_addr = config.listen_addr();

        info!("Binding TCP listener to {}", bind_addr);
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", bind_addr))?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let resource_manager = Arc::new(ResourceManager::new(config.server.max_sessions));

        Ok(Self {
            listener,
            local_addr,
            engine: Arc::new(RelayEngine::new(config)),
            resource_manager,
            next_session_id: AtomicUsize::new(1),
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sessions that have been admitted and not yet finished
    pub fn active_sessions(&self) -> usize {
        self.resource_manager.active_sessions()
    }

    pub fn resource_stats(&self) -> ResourceSnapshot {
        self.resource_manager.get_stats()
    }

    /// Main connection acceptance loop.
    ///
    /// Runs until `accept` fails; that error is returned and the listener stops.
    /// Sessions are spawned and never awaited here.
    pub async fn run(&self) -> Result<()> {
        info!("Starting connection acceptance loop");

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    return Err(e).context("Accept failed, listener stopped");
                }
            };
            debug!("Accepted connection from {}", addr);

            let slot = match self.resource_manager.acquire_session_slot() {
                Ok(slot) => slot,
                Err(_) => {
                    warn!(
                        "Session limit reached ({}), closing connection from {}",
                        self.resource_manager.get_stats().max_sessions.unwrap_or_default(),
                        addr
                    );
                    drop(stream);
                    continue;
                }
            };

            let session_id = format!(
                "session_{}",
                self.next_session_id.fetch_add(1, Ordering::Relaxed)
            );
            let engine = Arc::clone(&self.engine);

            tokio::spawn(async move {
                // Keep the slot alive for the duration of the session
                let _slot = slot;

                // Completed sessions log their own stats
                if let Err(e) = engine.run_session(session_id.clone(), stream, addr).await {
                    RelayEngine::report_failure(&session_id, &e);
                }
            });
        }
    }

    /// Accept connections until `run` fails or a shutdown notification arrives
    pub async fn run_until_shutdown(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown_rx.recv() => {
                info!("Received shutdown signal, stopping connection acceptance");
                Ok(())
            }
        }
    }
}
