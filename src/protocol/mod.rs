//! HTTP CONNECT Protocol Implementation
//! 
//! Request framing, status line parsing and the client side of the handshake.

pub mod constants;
pub mod handler;
pub mod types;

pub use constants::*;
pub use handler::ConnectHandler;
pub use types::*;
