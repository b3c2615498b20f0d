//! Network utilities
//!
//! Address resolution and peer labels for diagnostics.

use log::debug;
use std::net::SocketAddr;
use tokio::net::lookup_host;

use crate::error::SocketError;
use crate::server::ClientId;

/// Resolve a host and port to the first matching socket address
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, SocketError> {
    let unresolved = || SocketError::Resolve {
        host: host.to_string(),
        port,
    };

    match lookup_host((host, port)).await {
        Ok(mut addrs) => addrs.next().ok_or_else(unresolved),
        Err(e) => {
            debug!("Lookup of {}:{} failed: {}", host, port, e);
            Err(unresolved())
        }
    }
}

/// Human-readable identity of a connection, falling back to its id
pub fn peer_label(id: ClientId, peer: Option<SocketAddr>) -> String {
    match peer {
        Some(addr) => addr.to_string(),
        None => format!("client #{id}"),
    }
}
