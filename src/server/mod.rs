//! Server
//!
//! The listening side: bind with retry, accept loop, one receive task per
//! client, broadcast and shutdown.

pub mod config;
pub mod connection;
pub mod core;
pub mod registry;

pub use self::core::{Server, ServerBuilder};
pub use self::config::ServerConfig;
pub use connection::ConnectionHandle;
pub use registry::{BroadcastReport, ClientEntry, ClientId, ClientRegistry};
