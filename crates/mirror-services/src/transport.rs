//! Transport host boundary.
//!
//! The discovery engine and the control API only ever see this trait.
//! It names exactly the capabilities the core needs from whatever carries
//! bytes between peers: who am I, where do I listen, connect to a peer,
//! and which peers have a live connection right now.

use std::collections::HashSet;
use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

use mirror_core::PeerId;

#[async_trait]
pub trait TransportHost: Send + Sync {
    /// This node's own network-visible identifier.
    fn local_peer_id(&self) -> PeerId;

    /// Addresses this node accepts peer connections on.
    fn listen_addresses(&self) -> Vec<SocketAddr>;

    /// Attempt an outbound connection to `peer_id` at the given addresses,
    /// trying them in order. Returns Ok if a connection is established or
    /// one already exists.
    async fn connect(&self, peer_id: PeerId, addresses: &[SocketAddr]) -> Result<(), ConnectError>;

    /// The set of peers with a currently active connection.
    fn live_connections(&self) -> HashSet<PeerId>;

    /// Whether a live connection to `peer_id` exists right now.
    fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.live_connections().contains(peer_id)
    }
}

/// Per-peer connection failure. Never fatal to the process; the peer
/// simply stays offline in the directory.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no addresses to dial")]
    NoAddresses,

    #[error("hello exchange failed: {0}")]
    Handshake(String),

    #[error("peer identity mismatch: expected {expected}, got {actual}")]
    PeerMismatch { expected: PeerId, actual: PeerId },

    #[error("dial failed: {0}")]
    Io(#[from] std::io::Error),
}
