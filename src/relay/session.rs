//! Relay Session

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::protocol::HostPort;

/// Lifecycle of a relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resolving,
    Handshaking,
    Relaying,
    Closed,
    Aborted,
}

impl SessionState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, Handshaking)
                | (Resolving, Aborted)
                | (Handshaking, Relaying)
                | (Handshaking, Aborted)
                | (Relaying, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Aborted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One client connection's trip through the tunnel
#[derive(Debug)]
pub struct RelaySession {
    pub session_id: String,
    pub client_addr: SocketAddr,
    pub target: HostPort,
    pub proxy_addr: Option<SocketAddr>,
    pub start_time: Instant,
    state: SessionState,
    bytes_up: u64,
    bytes_down: u64,
}

/// Connection statistics for completed sessions
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub session_id: String,
    pub client_addr: SocketAddr,
    pub proxy_addr: Option<SocketAddr>,
    pub target: HostPort,
    pub final_state: SessionState,
    pub duration_ms: u64,
    pub bytes_up: u64,
    pub bytes_down: u64,
    pub total_bytes: u64,
}

impl RelaySession {
    /// Create a new relay session
    pub fn new(session_id: String, client_addr: SocketAddr, target: HostPort) -> Self {
        debug!("Creating new relay session: {} ({} -> {})",
               session_id, client_addr, target);

        Self {
            session_id,
            client_addr,
            target,
            proxy_addr: None,
            start_time: Instant::now(),
            state: SessionState::Idle,
            bytes_up: 0,
            bytes_down: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`, ignoring transitions the state machine does not allow
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!("Session {}: ignoring transition {} -> {}",
                   self.session_id, self.state, next);
            return false;
        }

        debug!("Session {}: {} -> {}", self.session_id, self.state, next);
        self.state = next;
        true
    }

    /// Get bytes transferred upstream (client to tunnel)
    pub fn bytes_up(&self) -> u64 {
        self.bytes_up
    }

    /// Get bytes transferred downstream (tunnel to client)
    pub fn bytes_down(&self) -> u64 {
        self.bytes_down
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_up + self.bytes_down
    }

    pub fn duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Record the totals reported by the two copy directions
    pub fn record_transfer(&mut self, bytes_up: u64, bytes_down: u64) {
        self.bytes_up = bytes_up;
        self.bytes_down = bytes_down;
    }

    /// Generate connection statistics
    pub fn to_stats(&self) -> ConnectionStats {
        ConnectionStats {
            session_id: self.session_id.clone(),
            client_addr: self.client_addr,
            proxy_addr: self.proxy_addr,
            target: self.target.clone(),
            final_state: self.state,
            duration_ms: self.duration().as_millis() as u64,
            bytes_up: self.bytes_up,
            bytes_down: self.bytes_down,
            total_bytes: self.total_bytes(),
        }
    }

    /// Log session statistics
    pub fn log_stats(&self) {
        info!(
            session_id = %self.session_id,
            client_addr = %self.client_addr,
            target = %self.target,
            state = %self.state,
            duration_ms = self.duration().as_millis() as u64,
            bytes_up = self.bytes_up,
            bytes_down = self.bytes_down,
            total_bytes = self.total_bytes(),
            "Relay session finished"
        );
    }
}
