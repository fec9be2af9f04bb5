//! Peer transport abstraction.
//!
//! The transport moves opaque MessagePack records between the peers of one
//! session. Delivery is best-effort: `send()` returning `Ok` means the bytes
//! were dispatched, not that anyone applied them. Lost records come back
//! through catch-up.
//!
//! Two implementations ship with the crate:
//! - [`MockTransport`] captures sent bytes and replays queued ones
//! - [`MemoryMesh`] connects any number of in-process peers

mod mesh;
mod mock;

pub use mesh::{MemoryMesh, MeshTransport};
pub use mock::MockTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Transport for broadcasting actions to the other peers of a session.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Broadcast bytes to every connected peer.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next record from any peer.
    ///
    /// Waits until data is available. Returns
    /// [`TransportError::ConnectionClosed`] once no more data can arrive.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the transport. Pending and future `recv()` calls end.
    async fn close(&self) -> Result<(), TransportError>;
}
