use log::{info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::handlers::is_retryable_bind;
use crate::error::{HandlerError, SocketError};
use crate::protocol::{Dispatcher, MessageHandler, message_handler};
use crate::server::config::ServerConfig;
use crate::server::connection::{ConnectionHandle, receive_loop};
use crate::server::registry::{BroadcastReport, ClientEntry, ClientId, ClientRegistry};
use crate::utils::resolve;

const LISTEN_BACKLOG: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindState {
    Pending,
    Bound(SocketAddr),
    Unbound,
}

/// State shared between the server handle, the accept task and every
/// receive task.
pub(crate) struct ServerState {
    pub(crate) config: ServerConfig,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) registry: ClientRegistry,
    started: AtomicBool,
    shutdown: watch::Sender<bool>,
    bound: watch::Sender<BindState>,
}

pub struct ServerBuilder {
    config: ServerConfig,
    handler: Option<MessageHandler>,
}

impl ServerBuilder {
    /// Set the callback receiving parsed messages. Without one, received
    /// data is discarded.
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[&[u8]], Option<&ConnectionHandle>) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.handler = Some(message_handler(handler));
        self
    }

    pub fn build(self) -> Result<Server, SocketError> {
        self.config.validate()?;

        let dispatcher = Dispatcher::new(self.handler, self.config.dispatch_mode())
            .with_command_delimiter(self.config.command_delimiter.as_deref())
            .with_argument_delimiter(self.config.argument_delimiter.as_deref());
        let (shutdown, _) = watch::channel(false);
        let (bound, _) = watch::channel(BindState::Pending);

        Ok(Server {
            state: Arc::new(ServerState {
                config: self.config,
                dispatcher,
                registry: ClientRegistry::new(),
                started: AtomicBool::new(false),
                shutdown,
                bound,
            }),
        })
    }
}

/// Listening side: accepts connections and runs one receive task per
/// client.
#[derive(Clone)]
pub struct Server {
    state: Arc<ServerState>,
}

impl Server {
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder {
            config,
            handler: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Spawn the accept task and return immediately.
    ///
    /// The task binds (retrying if configured), then accepts until
    /// [`Server::close`]. A fatal bind error is the task's output.
    pub fn start(&self) -> JoinHandle<Result<(), SocketError>> {
        tokio::spawn(accepter(Arc::clone(&self.state)))
    }

    /// Run the accept task on the current task until the server is closed.
    pub async fn run(&self) -> Result<(), SocketError> {
        accepter(Arc::clone(&self.state)).await
    }

    /// Wait for the bind phase to settle.
    ///
    /// Returns `None` when binding failed or the server has been closed.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut bound = self.state.bound.subscribe();
        let state = *bound
            .wait_for(|state| *state != BindState::Pending)
            .await
            .ok()?;
        match state {
            BindState::Bound(addr) => Some(addr),
            _ => None,
        }
    }

    /// Send `payload` to every connected client, pruning failed ones.
    pub async fn send_all(&self, payload: &[u8]) -> BroadcastReport {
        self.state.registry.broadcast(payload).await
    }

    pub async fn send_to(&self, id: ClientId, payload: &[u8]) -> Result<(), SocketError> {
        self.state.registry.send_to(id, payload).await
    }

    /// Close one client connection. Returns false if it was already gone.
    pub async fn disconnect(&self, id: ClientId) -> bool {
        self.state.registry.evict(id).await
    }

    pub async fn clients(&self) -> Vec<(ClientId, Option<SocketAddr>)> {
        self.state.registry.peers().await
    }

    pub async fn client_count(&self) -> usize {
        self.state.registry.len().await
    }

    /// Stop accepting and release the listening socket.
    ///
    /// Connected clients are left alone. Closing twice is harmless.
    pub fn close(&self) {
        if !self.state.shutdown.send_replace(true) {
            info!("Closing listener on {}", self.state.config.socket_addr_str());
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.state.shutdown.borrow()
    }
}

async fn accepter(state: Arc<ServerState>) -> Result<(), SocketError> {
    if state.started.swap(true, Ordering::SeqCst) {
        warn!("Server on {} already started", state.config.socket_addr_str());
        return Ok(());
    }

    let mut shutdown = state.shutdown.subscribe();
    let result = select! {
        _ = shutdown.wait_for(|closed| *closed) => Ok(()),
        result = bind_and_accept(&state) => result,
    };

    state.bound.send_replace(BindState::Unbound);
    result
}

async fn bind_and_accept(state: &Arc<ServerState>) -> Result<(), SocketError> {
    let addr = resolve(&state.config.host, state.config.port).await?;
    let listener = state
        .config
        .retry_policy()
        .run(
            &format!("Binding to {addr}"),
            || async move { bind_listener(addr) },
            is_retryable_bind,
        )
        .await
        .map_err(|source| SocketError::Bind { addr, source })?;

    let local = listener.local_addr()?;
    state.bound.send_replace(BindState::Bound(local));
    info!("Server listening on {}", local);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => accept_client(state, stream, peer).await,
            Err(e) => {
                warn!("Accept on {} failed: {}. Stopping accept loop.", local, e);
                return Ok(());
            }
        }
    }
}

fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

async fn accept_client(state: &Arc<ServerState>, stream: TcpStream, peer: SocketAddr) {
    let (reader, writer) = stream.into_split();
    let entry = ClientEntry::new(Some(peer), writer);
    let closed = entry.closed_signal();

    match state
        .registry
        .register(entry, state.config.welcome_bytes())
        .await
    {
        Ok(id) => {
            info!("Connection from {} has been accepted.", peer);
            let handle = ConnectionHandle::new(id, Some(peer));
            tokio::spawn(receive_loop(Arc::clone(state), handle, reader, closed));
        }
        Err(e) => warn!("Failed to greet {}: {}. Dropping connection.", peer, e),
    }
}
