//! Connection Management Module
//! 
//! Accepts local client connections and hands each one to a relay session.

pub mod manager;

pub use manager::ConnectionManager;
