use log::{debug, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, Notify};

use crate::client::config::ClientConfig;
use crate::client::handler::receive_loop;
use crate::error::handlers::is_retryable_connect;
use crate::error::{HandlerError, SocketError};
use crate::utils::resolve;

/// Callback receiving text from the server.
pub type TextHandler = Arc<dyn Fn(&str) -> Result<(), HandlerError> + Send + Sync>;

/// Write side of the current connection.
///
/// `generation` tells a stale receive task apart from the one servicing
/// the current connection after a reconnect. The writer has its own lock
/// so a stalled send never holds the link.
struct Link {
    generation: u64,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    closed: Arc<Notify>,
}

impl Link {
    async fn close(self) {
        self.closed.notify_one();
        match self.writer.try_lock() {
            Ok(mut writer) => {
                let _ = writer.shutdown().await;
            }
            Err(_) => debug!("Send in flight at close; leaving shutdown to drop."),
        }
    }
}

pub(crate) struct ClientState {
    pub(crate) config: ClientConfig,
    pub(crate) handler: Option<TextHandler>,
    link: Mutex<Option<Link>>,
    generation: AtomicU64,
}

impl ClientState {
    /// Close the current connection if it is still `generation`.
    pub(crate) async fn release(&self, generation: u64) -> bool {
        let link = {
            let mut link = self.link.lock().await;
            if link.as_ref().is_some_and(|l| l.generation == generation) {
                link.take()
            } else {
                None
            }
        };

        match link {
            Some(link) => {
                link.close().await;
                true
            }
            None => false,
        }
    }
}

pub struct ClientBuilder {
    config: ClientConfig,
    handler: Option<TextHandler>,
}

impl ClientBuilder {
    /// Set the callback receiving decoded text. Without one, received data
    /// is discarded.
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Client, SocketError> {
        self.config.validate()?;

        Ok(Client {
            state: Arc::new(ClientState {
                config: self.config,
                handler: self.handler,
                link: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        })
    }
}

/// Connecting side: one outbound connection and its receive task.
#[derive(Clone)]
pub struct Client {
    state: Arc<ClientState>,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            handler: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.state.config
    }

    /// Connect to the configured server and start receiving.
    ///
    /// A refused connection is retried at the configured interval when
    /// retry is enabled. Any previous connection is closed. Returns the
    /// local address of the new connection.
    pub async fn connect(&self) -> Result<SocketAddr, SocketError> {
        let config = &self.state.config;
        let addr = resolve(&config.host, config.port).await?;
        let stream = config
            .retry_policy()
            .run(
                &format!("Connecting to {addr}"),
                || TcpStream::connect(addr),
                is_retryable_connect,
            )
            .await
            .map_err(|source| SocketError::Connect { addr, source })?;

        let local = stream.local_addr()?;
        info!("Connected to {} from {}", addr, local);

        let (reader, writer) = stream.into_split();
        let generation = self.state.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let closed = Arc::new(Notify::new());
        let previous = self.state.link.lock().await.replace(Link {
            generation,
            writer: Arc::new(Mutex::new(writer)),
            closed: Arc::clone(&closed),
        });
        if let Some(previous) = previous {
            previous.close().await;
        }

        tokio::spawn(receive_loop(
            Arc::clone(&self.state),
            generation,
            addr,
            reader,
            closed,
        ));
        Ok(local)
    }

    /// Write `payload` with a single send call.
    ///
    /// Returns the number of bytes the socket accepted, which may be less
    /// than the payload.
    pub async fn send(&self, payload: &[u8]) -> Result<usize, SocketError> {
        let writer = self
            .state
            .link
            .lock()
            .await
            .as_ref()
            .map(|link| Arc::clone(&link.writer))
            .ok_or(SocketError::NotConnected)?;
        let mut writer = writer.lock().await;
        Ok(writer.write(payload).await?)
    }

    /// Shut down the connection and stop its receive task.
    pub async fn close(&self) {
        let link = self.state.link.lock().await.take();
        if let Some(link) = link {
            info!("Closing connection to {}", self.state.config.socket_addr_str());
            link.close().await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.link.lock().await.is_some()
    }
}
