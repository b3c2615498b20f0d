//! Client registry
//!
//! Tracks the write side of every accepted connection. The map lock only
//! guards adds, removals and snapshots; writes go through a per-connection
//! writer lock taken after the map lock is released, so a peer that stops
//! reading stalls only the task writing to it. Removing an entry and
//! closing it always happen together, removal first.

use log::{debug, warn};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;

use crate::error::SocketError;
use crate::utils::peer_label;

/// Identifier assigned to a connection when it is accepted
pub type ClientId = u64;

type ClientWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Registered side of one connection.
///
/// Holds the writer and a close signal that stops the connection's
/// receive loop when the entry is closed from elsewhere. Clones share both.
#[derive(Clone)]
pub struct ClientEntry {
    peer: Option<SocketAddr>,
    writer: Arc<Mutex<ClientWriter>>,
    closed: Arc<Notify>,
}

impl ClientEntry {
    pub fn new<W>(peer: Option<SocketAddr>, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            peer,
            writer: Arc::new(Mutex::new(Box::new(writer))),
            closed: Arc::new(Notify::new()),
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Signal raised once this entry is closed
    pub fn closed_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.closed)
    }

    async fn send(&self, payload: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(payload).await?;
        writer.flush().await
    }

    async fn close(&self) {
        self.closed.notify_one();
        // A send still in flight owns the writer; the socket is released
        // when that send ends and the last clone drops.
        match self.writer.try_lock() {
            Ok(mut writer) => {
                // Fails harmlessly when the peer is already gone.
                let _ = writer.shutdown().await;
            }
            Err(_) => debug!("Writer busy at close; leaving shutdown to drop."),
        }
    }
}

/// Outcome of a broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub pruned: Vec<ClientId>,
}

/// Registry for tracking connected clients
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, ClientEntry>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a connection, greeting it first when `welcome` is given.
    ///
    /// The greeting is written before the entry becomes visible, so no
    /// broadcast can reach the client ahead of it. A failed greeting closes
    /// the entry and leaves it unregistered.
    pub async fn register(
        &self,
        entry: ClientEntry,
        welcome: Option<&[u8]>,
    ) -> io::Result<ClientId> {
        if let Some(welcome) = welcome {
            if let Err(e) = entry.send(welcome).await {
                entry.close().await;
                return Err(e);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().await.insert(id, entry);
        Ok(id)
    }

    /// Remove a connection and close it.
    ///
    /// Returns false when it was already gone; concurrent removers race
    /// benignly.
    pub async fn evict(&self, id: ClientId) -> bool {
        let entry = self.clients.lock().await.remove(&id);
        match entry {
            Some(entry) => {
                entry.close().await;
                true
            }
            None => false,
        }
    }

    /// Send the full payload to one client, pruning it on failure.
    pub async fn send_to(&self, id: ClientId, payload: &[u8]) -> Result<(), SocketError> {
        let entry = self
            .clients
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(SocketError::UnknownClient(id))?;

        if let Err(e) = entry.send(payload).await {
            warn!(
                "Error trying to send to {}: {}. Shutting down.",
                peer_label(id, entry.peer),
                e
            );
            self.evict(id).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Send the full payload to every client registered when the call
    /// starts.
    ///
    /// Each client is written from its own task, so a peer that stops
    /// reading holds up only its own send. Clients whose send fails are
    /// removed, then closed; all others are still attempted. A client
    /// registered concurrently is either fully included or not at all.
    pub async fn broadcast(&self, payload: &[u8]) -> BroadcastReport {
        let targets: Vec<(ClientId, ClientEntry)> = self
            .clients
            .lock()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();

        let payload: Arc<[u8]> = Arc::from(payload);
        let mut sends = JoinSet::new();
        for (id, entry) in targets {
            let payload = Arc::clone(&payload);
            sends.spawn(async move {
                let result = entry.send(&payload).await;
                (id, entry.peer, result)
            });
        }

        let mut report = BroadcastReport::default();
        while let Some(joined) = sends.join_next().await {
            let (id, peer, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Broadcast send task failed: {}", e);
                    continue;
                }
            };
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        "Error trying to send to {}: {}. Shutting down.",
                        peer_label(id, peer),
                        e
                    );
                    self.evict(id).await;
                    report.pruned.push(id);
                }
            }
        }

        report.pruned.sort_unstable();
        report
    }

    pub async fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Snapshot of registered ids and their peer addresses, ordered by id
    pub async fn peers(&self) -> Vec<(ClientId, Option<SocketAddr>)> {
        let mut peers: Vec<_> = self
            .clients
            .lock()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.peer))
            .collect();
        peers.sort_by_key(|(id, _)| *id);
        peers
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
