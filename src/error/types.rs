//! Error types
//!
//! Defines the errors surfaced by the server, the client and message handlers.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::Utf8Error;

use crate::server::ClientId;

/// Error returned by a message handler.
///
/// A handler error is treated like a read failure: the connection that
/// produced the message is torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::new(message)
    }
}

/// Top-level error for socket operations
#[derive(Debug)]
pub enum SocketError {
    Config(config::ConfigError),
    Resolve { host: String, port: u16 },
    Bind { addr: SocketAddr, source: io::Error },
    Connect { addr: SocketAddr, source: io::Error },
    NotConnected,
    UnknownClient(ClientId),
    Decode(Utf8Error),
    Handler(HandlerError),
    Io(io::Error),
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketError::Config(e) => write!(f, "Configuration error: {}", e),
            SocketError::Resolve { host, port } => {
                write!(f, "Could not resolve address {}:{}", host, port)
            }
            SocketError::Bind { addr, source } => {
                write!(f, "Failed to bind to {}: {}", addr, source)
            }
            SocketError::Connect { addr, source } => {
                write!(f, "Failed to connect to {}: {}", addr, source)
            }
            SocketError::NotConnected => write!(f, "Not connected"),
            SocketError::UnknownClient(id) => write!(f, "Unknown client #{}", id),
            SocketError::Decode(e) => write!(f, "Received data is not valid UTF-8: {}", e),
            SocketError::Handler(e) => write!(f, "Handler error: {}", e),
            SocketError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for SocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SocketError::Config(e) => Some(e),
            SocketError::Bind { source, .. } | SocketError::Connect { source, .. } => Some(source),
            SocketError::Decode(e) => Some(e),
            SocketError::Handler(e) => Some(e),
            SocketError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for SocketError {
    fn from(error: config::ConfigError) -> Self {
        SocketError::Config(error)
    }
}

impl From<HandlerError> for SocketError {
    fn from(error: HandlerError) -> Self {
        SocketError::Handler(error)
    }
}

impl From<Utf8Error> for SocketError {
    fn from(error: Utf8Error) -> Self {
        SocketError::Decode(error)
    }
}

impl From<io::Error> for SocketError {
    fn from(error: io::Error) -> Self {
        SocketError::Io(error)
    }
}
