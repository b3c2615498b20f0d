//! Per-connection receive loop
//!
//! Each accepted connection gets its own task that reads chunks, dispatches
//! them and tears the connection down on the first failure.

use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::select;
use tokio::sync::Notify;

use crate::error::SocketError;
use crate::server::core::ServerState;
use crate::server::registry::ClientId;
use crate::utils::peer_label;

/// The connection a message arrived on, as seen by a handler.
///
/// Bytes queued with [`ConnectionHandle::reply`] are written back to the
/// peer once the handler returns, before the next read.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ClientId,
    peer: Option<SocketAddr>,
    replies: Mutex<Vec<u8>>,
}

impl ConnectionHandle {
    pub fn new(id: ClientId, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer,
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Peer address, or the connection id when the address is unknown
    pub fn label(&self) -> String {
        peer_label(self.id, self.peer)
    }

    pub fn reply(&self, payload: impl AsRef<[u8]>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(payload.as_ref());
    }

    pub(crate) fn take_replies(&self) -> Vec<u8> {
        std::mem::take(&mut *self.replies.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

enum Step {
    Continue,
    Hangup,
    Disconnect,
}

/// Services one connection until it fails, hangs up, auto-disconnects or
/// is closed from elsewhere.
///
/// Every exit except an external close evicts the connection from the
/// registry, which also closes it.
pub(crate) async fn receive_loop<R>(
    state: Arc<ServerState>,
    handle: ConnectionHandle,
    mut reader: R,
    closed: Arc<Notify>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; state.config.read_chunk_size];

    loop {
        let step = select! {
            _ = closed.notified() => {
                debug!("Receiver for {} stopped: connection closed.", handle.label());
                return;
            }
            step = receive_once(&state, &handle, &mut reader, &mut buf) => step,
        };

        match step {
            Ok(Step::Continue) => {}
            Ok(Step::Hangup) => {
                info!("Connection from {} closed by peer.", handle.label());
                break;
            }
            Ok(Step::Disconnect) => {
                debug!("Disconnecting {} after first message.", handle.label());
                break;
            }
            Err(e) => {
                error!(
                    "Error trying to receive from {}: {}. Stopping receiver.",
                    handle.label(),
                    e
                );
                break;
            }
        }
    }

    state.registry.evict(handle.id()).await;
}

async fn receive_once<R>(
    state: &ServerState,
    handle: &ConnectionHandle,
    reader: &mut R,
    buf: &mut [u8],
) -> Result<Step, SocketError>
where
    R: AsyncRead + Unpin,
{
    let n = reader.read(buf).await?;
    if n == 0 {
        return Ok(Step::Hangup);
    }

    state.dispatcher.dispatch(&buf[..n], handle)?;

    let replies = handle.take_replies();
    if !replies.is_empty() {
        state.registry.send_to(handle.id(), &replies).await?;
    }

    if state.config.auto_disconnect {
        Ok(Step::Disconnect)
    } else {
        Ok(Step::Continue)
    }
}
