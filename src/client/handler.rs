use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::select;
use tokio::sync::Notify;

use crate::client::core::ClientState;
use crate::error::SocketError;

/// Reads from the server and hands decoded text to the handler.
///
/// Ends on a read error, invalid UTF-8, a handler error, end-of-stream or
/// an explicit close. Every exit other than an explicit close releases the
/// connection.
pub(crate) async fn receive_loop<R>(
    state: Arc<ClientState>,
    generation: u64,
    peer: SocketAddr,
    mut reader: R,
    closed: Arc<Notify>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; state.config.read_chunk_size];

    loop {
        let received = select! {
            _ = closed.notified() => {
                debug!("Receiver for {} stopped: connection closed.", peer);
                return;
            }
            received = receive_once(&state, &mut reader, &mut buf) => received,
        };

        match received {
            Ok(true) => {}
            Ok(false) => {
                info!("Connection to {} closed by server.", peer);
                break;
            }
            Err(e) => {
                error!(
                    "Error trying to receive from {}: {}. Stopping receiver.",
                    peer, e
                );
                break;
            }
        }
    }

    state.release(generation).await;
}

async fn receive_once<R>(
    state: &ClientState,
    reader: &mut R,
    buf: &mut [u8],
) -> Result<bool, SocketError>
where
    R: AsyncRead + Unpin,
{
    let n = reader.read(buf).await?;
    if n == 0 {
        return Ok(false);
    }

    if let Some(handler) = &state.handler {
        let text = std::str::from_utf8(&buf[..n])?;
        handler(text)?;
    }

    Ok(true)
}
