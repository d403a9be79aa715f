//! Discovery engine — advertises this node on the local network and
//! reacts to sightings of other nodes by connecting to them.
//!
//! Two tasks: a periodic multicast announcer and a listener that turns
//! incoming datagrams into discovery events. All reactive work happens
//! per event; there is no polling loop beyond the announce interval.

pub mod announce;
pub mod listener;

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use mirror_core::config::DiscoveryConfig;
use mirror_core::wire::{tag_hash, PresenceAnnouncement, ANNOUNCE_PORT, MULTICAST_ADDR};
use mirror_core::Identity;
use mirror_services::{PeerDirectory, TransportHost};

use listener::Reactor;

/// Runtime settings for the engine, usually built from config.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub service_tag: String,
    pub multicast_addr: Ipv4Addr,
    pub announce_port: u16,
    pub announce_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            service_tag: "mirrornet-p2p".to_string(),
            multicast_addr: MULTICAST_ADDR,
            announce_port: ANNOUNCE_PORT,
            announce_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl DiscoverySettings {
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            service_tag: config.service_tag.clone(),
            announce_interval: Duration::from_secs(config.announce_interval_secs.max(1)),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs.max(1)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The advertisement socket could not bind or join the multicast
    /// group. Fatal to the engine; the rest of the process may continue
    /// with inbound connections only.
    #[error("failed to start discovery: {0}")]
    Start(#[source] std::io::Error),
}

/// Handles to the engine's two tasks. Dropping this does not stop them;
/// signal the shutdown channel passed to `start`, or call `abort`.
pub struct DiscoveryHandle {
    pub announce_task: JoinHandle<()>,
    pub listener_task: JoinHandle<()>,
}

impl DiscoveryHandle {
    pub fn abort(&self) {
        self.announce_task.abort();
        self.listener_task.abort();
    }
}

/// Start advertising and listening. One start per process; calling this
/// twice with the same announce port is a caller error.
///
/// Sockets are created before any task is spawned, so every bind/join
/// failure surfaces here as `DiscoveryError::Start`.
pub fn start(
    identity: Arc<Identity>,
    transport: Arc<dyn TransportHost>,
    directory: Arc<PeerDirectory>,
    settings: DiscoverySettings,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<DiscoveryHandle, DiscoveryError> {
    let tag = tag_hash(&settings.service_tag);
    let listen_port = transport
        .listen_addresses()
        .first()
        .map(|a| a.port())
        .unwrap_or(0);
    let announcement = PresenceAnnouncement::new(tag, identity.public_key(), listen_port);

    let announce_socket = announce::make_announce_socket().map_err(DiscoveryError::Start)?;
    let listener_socket =
        listener::make_listener_socket(settings.multicast_addr, settings.announce_port)
            .map_err(DiscoveryError::Start)?;
    let listener_socket =
        tokio::net::UdpSocket::from_std(listener_socket).map_err(DiscoveryError::Start)?;

    let dest = SocketAddr::V4(SocketAddrV4::new(
        settings.multicast_addr,
        settings.announce_port,
    ));

    let reactor = Arc::new(Reactor::new(
        identity.peer_id(),
        transport,
        directory,
        tag,
        settings.connect_timeout,
    ));

    let announce_task = tokio::spawn(announce::announce_loop(
        announcement,
        announce_socket,
        dest,
        settings.announce_interval,
        shutdown_tx.subscribe(),
    ));
    let listener_task = tokio::spawn(listener::listener_loop(
        listener_socket,
        reactor,
        shutdown_tx.subscribe(),
    ));

    tracing::info!(
        tag = %settings.service_tag,
        group = %settings.multicast_addr,
        port = settings.announce_port,
        "discovery running"
    );

    Ok(DiscoveryHandle {
        announce_task,
        listener_task,
    })
}
