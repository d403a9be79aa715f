//! Full discovery reaction path: a raw presence datagram from one live
//! node, fed through the reactor of another, ends in a TCP connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use zerocopy::AsBytes;

use mirror_core::wire::{tag_hash, PresenceAnnouncement};
use mirror_services::{ConnectionStatus, TransportHost};
use mirrord::discovery::listener::Reactor;

use crate::infra::{spawn_node, wait_until};

const TAG: &str = "mirrornet-p2p";

#[tokio::test]
async fn sighting_of_a_live_node_ends_in_a_connection() {
    let a = spawn_node().await.unwrap();
    let b = spawn_node().await.unwrap();

    let reactor = Arc::new(Reactor::new(
        a.identity.peer_id(),
        a.host(),
        Arc::clone(&a.directory),
        tag_hash(TAG),
        Duration::from_secs(2),
    ));

    // The datagram b's announce loop would have sent, as received from
    // b's loopback address.
    let datagram = PresenceAnnouncement::new(
        tag_hash(TAG),
        b.identity.public_key(),
        b.transport.listen_port(),
    );
    let src: SocketAddr = "127.0.0.1:41000".parse().unwrap();

    let event = reactor.parse_datagram(datagram.as_bytes(), src).unwrap();
    assert_eq!(event.peer_id, b.identity.peer_id());
    reactor.handle_event(event);

    wait_until("a connects to b", || {
        a.transport.is_connected(&b.identity.peer_id())
    })
    .await
    .unwrap();
    wait_until("b accepts a", || {
        b.transport.is_connected(&a.identity.peer_id())
    })
    .await
    .unwrap();

    let view = a.directory.snapshot(a.transport.as_ref());
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].status, ConnectionStatus::Online);
    assert_eq!(view[0].addresses[0].port(), b.transport.listen_port());
}

#[tokio::test]
async fn own_announcement_is_never_acted_on() {
    let a = spawn_node().await.unwrap();

    let reactor = Arc::new(Reactor::new(
        a.identity.peer_id(),
        a.host(),
        Arc::clone(&a.directory),
        tag_hash(TAG),
        Duration::from_secs(2),
    ));

    let datagram = PresenceAnnouncement::new(
        tag_hash(TAG),
        a.identity.public_key(),
        a.transport.listen_port(),
    );
    let src: SocketAddr = "127.0.0.1:41000".parse().unwrap();

    let event = reactor.parse_datagram(datagram.as_bytes(), src).unwrap();
    reactor.handle_event(event);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(a.directory.is_empty());
    assert!(a.transport.connections().is_empty());
}
