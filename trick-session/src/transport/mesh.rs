//! In-process mesh of peers.
//!
//! Every peer that joins a [`MemoryMesh`] gets a [`MeshTransport`]. A send
//! reaches every other connected peer. Records sent while a peer is
//! disconnected are lost to it, the same way a dropped network link loses
//! them, and have to be recovered through catch-up.

use super::{PeerTransport, TransportError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug)]
struct PeerSlot {
    inbox: mpsc::UnboundedSender<Vec<u8>>,
    connected: bool,
}

type Peers = Arc<DashMap<usize, PeerSlot>>;

/// A set of in-process peers that broadcast to each other.
#[derive(Debug, Clone, Default)]
pub struct MemoryMesh {
    peers: Peers,
    next_id: Arc<AtomicUsize>,
}

impl MemoryMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connected peer and return its transport.
    pub fn join(&self) -> MeshTransport {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.insert(
            id,
            PeerSlot {
                inbox: tx,
                connected: true,
            },
        );
        tracing::debug!(peer = id, peers = self.peers.len(), "peer joined mesh");
        MeshTransport {
            id,
            peers: Arc::clone(&self.peers),
            inbox: Mutex::new(rx),
        }
    }

    /// Reconnect a peer. Returns `false` if the peer has left.
    pub fn connect(&self, peer: usize) -> bool {
        self.set_connected(peer, true)
    }

    /// Disconnect a peer without removing it. Returns `false` if the peer
    /// has left.
    pub fn disconnect(&self, peer: usize) -> bool {
        self.set_connected(peer, false)
    }

    fn set_connected(&self, peer: usize, connected: bool) -> bool {
        match self.peers.get_mut(&peer) {
            Some(mut slot) => {
                slot.connected = connected;
                tracing::debug!(peer, connected, "mesh link changed");
                true
            }
            None => false,
        }
    }

    /// Number of peers still in the mesh.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

/// One peer's view of a [`MemoryMesh`].
#[derive(Debug)]
pub struct MeshTransport {
    id: usize,
    peers: Peers,
    inbox: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MeshTransport {
    /// This peer's id within the mesh.
    pub fn peer_id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl PeerTransport for MeshTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        for slot in self.peers.iter() {
            if *slot.key() == self.id || !slot.connected {
                continue;
            }
            // A peer that closed mid-broadcast is skipped like a
            // disconnected one.
            let _ = slot.inbox.send(data.to_vec());
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut inbox = self.inbox.lock().await;
        inbox.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.peers
            .get(&self.id)
            .map(|slot| slot.connected)
            .unwrap_or(false)
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping the slot drops the inbox sender, which ends recv().
        self.peers.remove(&self.id);
        tracing::debug!(peer = self.id, "peer left mesh");
        Ok(())
    }
}

impl Drop for MeshTransport {
    fn drop(&mut self) {
        self.peers.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn try_recv(transport: &MeshTransport) -> Option<Vec<u8>> {
        tokio::time::timeout(Duration::from_millis(30), transport.recv())
            .await
            .ok()
            .and_then(Result::ok)
    }

    #[tokio::test]
    async fn send_reaches_every_other_peer() {
        let mesh = MemoryMesh::new();
        let a = mesh.join();
        let b = mesh.join();
        let c = mesh.join();

        a.send(b"hello").await.unwrap();

        assert_eq!(b.recv().await.unwrap(), b"hello");
        assert_eq!(c.recv().await.unwrap(), b"hello");
        assert!(try_recv(&a).await.is_none());
    }

    #[tokio::test]
    async fn disconnected_peer_misses_records() {
        let mesh = MemoryMesh::new();
        let a = mesh.join();
        let b = mesh.join();

        assert!(mesh.disconnect(b.peer_id()));
        a.send(b"lost").await.unwrap();
        assert!(mesh.connect(b.peer_id()));
        a.send(b"kept").await.unwrap();

        assert_eq!(b.recv().await.unwrap(), b"kept");
    }

    #[tokio::test]
    async fn disconnected_sender_fails() {
        let mesh = MemoryMesh::new();
        let a = mesh.join();
        let _b = mesh.join();

        mesh.disconnect(a.peer_id());
        assert!(!a.is_connected());
        assert!(matches!(
            a.send(b"x").await.unwrap_err(),
            TransportError::NotConnected
        ));
    }

    #[tokio::test]
    async fn close_ends_recv_and_leaves_mesh() {
        let mesh = MemoryMesh::new();
        let a = mesh.join();
        let b = mesh.join();

        b.close().await.unwrap();
        assert_eq!(mesh.peer_count(), 1);
        assert!(!mesh.connect(b.peer_id()));
        assert!(matches!(
            b.recv().await.unwrap_err(),
            TransportError::ConnectionClosed
        ));

        // Sending to a mesh where everyone else left still succeeds.
        a.send(b"alone").await.unwrap();
    }

    #[tokio::test]
    async fn dropping_a_transport_leaves_the_mesh() {
        let mesh = MemoryMesh::new();
        let a = mesh.join();
        {
            let _b = mesh.join();
            assert_eq!(mesh.peer_count(), 2);
        }
        assert_eq!(mesh.peer_count(), 1);
        drop(a);
        assert_eq!(mesh.peer_count(), 0);
    }
}
