//! Peer directory — the single source of truth for known peers.
//!
//! Every peer ever sighted or connected gets one record, keyed on peer id,
//! retained for the life of the process. Backed by a DashMap so updates to
//! one record are linearizable under its shard lock while updates to other
//! records proceed in parallel, and a snapshot never observes a record
//! half-updated.

use std::net::SocketAddr;
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use mirror_core::PeerId;

use crate::transport::TransportHost;

/// Whether the transport currently holds an active connection to a peer.
/// Resolved fresh at snapshot time, never cached in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Online => f.write_str("online"),
            ConnectionStatus::Offline => f.write_str("offline"),
        }
    }
}

/// A sighting of a peer on the local network. Transient: consumed to
/// update the directory and trigger a connection attempt, never stored.
#[derive(Debug, Clone)]
pub struct DiscoveryEvent {
    pub peer_id: PeerId,
    pub public_key: [u8; 32],
    pub addresses: Vec<SocketAddr>,
    pub observed_at: SystemTime,
}

/// Point-in-time view of one known peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub peer_id: PeerId,
    /// Most-recently-seen first, no duplicates.
    pub addresses: Vec<SocketAddr>,
    pub status: ConnectionStatus,
    pub last_seen: SystemTime,
}

#[derive(Debug, Clone)]
struct PeerState {
    addresses: Vec<SocketAddr>,
    last_seen: SystemTime,
}

/// The directory itself. One instance per running node, shared by Arc
/// with the discovery engine, the transport, and the control API.
#[derive(Default)]
pub struct PeerDirectory {
    peers: DashMap<PeerId, PeerState>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Insert or merge a sighting. Returns true if the peer is new.
    ///
    /// Addresses are deduplicated with the newest observation first.
    /// `last_seen` only moves forward: a late-delivered stale event
    /// cannot regress it.
    pub fn upsert_sighting(
        &self,
        peer_id: PeerId,
        addresses: &[SocketAddr],
        observed_at: SystemTime,
    ) -> bool {
        match self.peers.entry(peer_id) {
            Entry::Occupied(mut occupied) => {
                let state = occupied.get_mut();
                merge_addresses(&mut state.addresses, addresses);
                if observed_at > state.last_seen {
                    state.last_seen = observed_at;
                }
                false
            }
            Entry::Vacant(vacant) => {
                let mut deduped = Vec::new();
                merge_addresses(&mut deduped, addresses);
                vacant.insert(PeerState {
                    addresses: deduped,
                    last_seen: observed_at,
                });
                true
            }
        }
    }

    /// Immutable point-in-time list of all known peers, with connection
    /// status resolved against the transport's live connection set.
    /// Safe to call concurrently with any number of upserts.
    pub fn snapshot(&self, transport: &dyn TransportHost) -> Vec<PeerRecord> {
        let live = transport.live_connections();
        let mut records: Vec<PeerRecord> = self
            .peers
            .iter()
            .map(|entry| {
                let status = if live.contains(entry.key()) {
                    ConnectionStatus::Online
                } else {
                    ConnectionStatus::Offline
                };
                PeerRecord {
                    peer_id: *entry.key(),
                    addresses: entry.value().addresses.clone(),
                    status,
                    last_seen: entry.value().last_seen,
                }
            })
            .collect();

        // Newest first; peer id breaks ties so the order is stable
        records.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.peer_id.cmp(&b.peer_id)));
        records
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Merge `incoming` into `existing`, newest first, duplicates suppressed.
fn merge_addresses(existing: &mut Vec<SocketAddr>, incoming: &[SocketAddr]) {
    for addr in incoming.iter().rev() {
        existing.retain(|a| a != addr);
        existing.insert(0, *addr);
    }
}
