//! Resource Management
//!
//! Session admission and counters. Without a configured limit every session is
//! admitted; with one, sessions beyond the limit are rejected.

use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Tracks active sessions and enforces the optional session limit
pub struct ResourceManager {
    max_sessions: Option<usize>,
    /// Absent when sessions are unbounded
    session_semaphore: Option<Arc<Semaphore>>,
    active_sessions: Arc<AtomicUsize>,
    stats: ResourceStats,
}

/// Resource usage statistics
#[derive(Debug, Default)]
pub struct ResourceStats {
    pub peak_sessions: AtomicUsize,
    pub total_sessions_admitted: AtomicUsize,
    pub total_sessions_rejected: AtomicUsize,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    pub active_sessions: usize,
    pub peak_sessions: usize,
    pub total_sessions_admitted: usize,
    pub total_sessions_rejected: usize,
    pub max_sessions: Option<usize>,
}

impl ResourceManager {
    /// Create a new resource manager
    pub fn new(max_sessions: Option<usize>) -> Self {
        Self {
            max_sessions,
            session_semaphore: max_sessions.map(|max| Arc::new(Semaphore::new(max))),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            stats: ResourceStats::default(),
        }
    }

    /// Try to acquire a session slot
    pub fn acquire_session_slot(&self) -> Result<SessionSlot> {
        let permit = match &self.session_semaphore {
            Some(semaphore) => match Arc::clone(semaphore).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats
                        .total_sessions_rejected
                        .fetch_add(1, Ordering::Relaxed);
                    return Err(anyhow::anyhow!("Session limit reached"));
                }
            },
            None => None,
        };

        self.stats
            .total_sessions_admitted
            .fetch_add(1, Ordering::Relaxed);
        let current = self.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;

        // Update peak sessions
        let mut peak = self.stats.peak_sessions.load(Ordering::Relaxed);
        while current > peak {
            match self.stats.peak_sessions.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => peak = x,
            }
        }

        debug!("Acquired session slot, active sessions: {}", current);
        Ok(SessionSlot {
            _permit: permit,
            active_sessions: Arc::clone(&self.active_sessions),
        })
    }

    /// Number of sessions currently holding a slot
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Get resource statistics
    pub fn get_stats(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            active_sessions: self.active_sessions(),
            peak_sessions: self.stats.peak_sessions.load(Ordering::Relaxed),
            total_sessions_admitted: self.stats.total_sessions_admitted.load(Ordering::Relaxed),
            total_sessions_rejected: self.stats.total_sessions_rejected.load(Ordering::Relaxed),
            max_sessions: self.max_sessions,
        }
    }
}

/// RAII guard for one admitted session; releases the slot on drop
#[derive(Debug)]
pub struct SessionSlot {
    _permit: Option<OwnedSemaphorePermit>,
    active_sessions: Arc<AtomicUsize>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        let remaining = self.active_sessions.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!("Released session slot, active sessions: {}", remaining);
    }
}
