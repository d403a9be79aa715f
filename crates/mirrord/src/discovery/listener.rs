//! Multicast listener and the reactor that turns datagrams into
//! connection attempts.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use zerocopy::FromBytes;

use mirror_core::wire::{PresenceAnnouncement, TagHash, ANNOUNCE_MAGIC, WIRE_VERSION};
use mirror_core::PeerId;
use mirror_services::{DiscoveryEvent, PeerDirectory, TransportHost};

/// Build the receive socket. `reuse_address` lets several daemons on
/// one host share the announce port, which is how loopback discovery
/// between local test nodes works.
pub fn make_listener_socket(group: Ipv4Addr, port: u16) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).into())?;
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Per-engine state shared between the listener loop and the attempt
/// tasks it spawns.
pub struct Reactor {
    local_peer_id: PeerId,
    transport: Arc<dyn TransportHost>,
    directory: Arc<PeerDirectory>,
    expected_tag: TagHash,
    connect_timeout: Duration,
    /// Peers with a connection attempt currently in flight. An entry
    /// here suppresses further attempts until the owner removes it.
    attempts: DashMap<PeerId, Instant>,
}

impl Reactor {
    pub fn new(
        local_peer_id: PeerId,
        transport: Arc<dyn TransportHost>,
        directory: Arc<PeerDirectory>,
        expected_tag: TagHash,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            local_peer_id,
            transport,
            directory,
            expected_tag,
            connect_timeout,
            attempts: DashMap::new(),
        }
    }

    /// Validate a raw datagram and lift it into an event. Anything
    /// malformed or foreign returns `None` and is dropped silently;
    /// multicast groups are shared and noise is expected.
    pub fn parse_datagram(&self, buf: &[u8], src: SocketAddr) -> Option<DiscoveryEvent> {
        let announcement = PresenceAnnouncement::read_from_prefix(buf)?;
        let magic = announcement.magic;
        let version = announcement.version;
        let tag = announcement.tag_hash;
        let public_key = announcement.public_key;
        let listen_port = announcement.listen_port;
        if magic != ANNOUNCE_MAGIC || version != WIRE_VERSION {
            return None;
        }
        if tag != self.expected_tag {
            return None;
        }
        let addresses = if listen_port == 0 {
            Vec::new()
        } else {
            vec![SocketAddr::new(src.ip(), listen_port)]
        };
        Some(DiscoveryEvent {
            peer_id: PeerId::from_public_key(&public_key),
            public_key,
            addresses,
            observed_at: SystemTime::now(),
        })
    }

    /// React to one sighting. Cheap and non-blocking; the actual dial
    /// runs on its own task under a timeout.
    pub fn handle_event(self: &Arc<Self>, event: DiscoveryEvent) {
        if event.peer_id == self.local_peer_id {
            return;
        }
        let is_new = self
            .directory
            .upsert_sighting(event.peer_id, &event.addresses, event.observed_at);
        if is_new {
            tracing::info!(peer = %event.peer_id, addrs = ?event.addresses, "peer discovered");
        }
        if self.transport.is_connected(&event.peer_id) {
            // Sighting already refreshed the directory; nothing to dial.
            return;
        }
        match self.attempts.entry(event.peer_id) {
            Entry::Occupied(_) => return,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
            }
        }
        let reactor = Arc::clone(self);
        tokio::spawn(async move {
            reactor.attempt_connect(event.peer_id, event.addresses).await;
        });
    }

    async fn attempt_connect(&self, peer_id: PeerId, addresses: Vec<SocketAddr>) {
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.connect_timeout, self.transport.connect(peer_id, &addresses))
                .await;
        match outcome {
            Ok(Ok(())) => {
                tracing::info!(peer = %peer_id, elapsed = ?started.elapsed(), "connected");
            }
            Ok(Err(err)) => {
                tracing::debug!(peer = %peer_id, error = %err, "connection attempt failed");
            }
            Err(_) => {
                tracing::debug!(peer = %peer_id, timeout = ?self.connect_timeout, "connection attempt timed out");
            }
        }
        // Release the guard last so a concurrent sighting re-arms a
        // fresh attempt instead of piling onto this one.
        self.attempts.remove(&peer_id);
    }
}

pub async fn listener_loop(
    socket: UdpSocket,
    reactor: Arc<Reactor>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut buf = [0u8; 256];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, src)) => {
                        if let Some(event) = reactor.parse_datagram(&buf[..len], src) {
                            reactor.handle_event(event);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "announce receive failed");
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("listener loop stopping");
                return;
            }
        }
    }
}
