pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod utils;

pub use client::{Client, ClientConfig};
pub use self::config::Settings;
pub use error::{HandlerError, SocketError};
pub use protocol::DispatchMode;
pub use server::{ConnectionHandle, Server, ServerConfig};
