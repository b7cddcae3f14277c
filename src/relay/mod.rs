//! Data Relay Module
//! 
//! Runs one client connection through the proxy tunnel and copies data both ways.

pub mod copier;
pub mod engine;
pub mod session;

pub use copier::copy_stream;
pub use engine::RelayEngine;
pub use session::{ConnectionStats, RelaySession, SessionState};
