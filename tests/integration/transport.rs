//! Two real nodes connecting over loopback TCP.

use mirror_services::{ConnectionStatus, TransportHost};

use crate::infra::{spawn_node, wait_until};

#[tokio::test]
async fn two_nodes_connect_and_both_see_it() {
    let a = spawn_node().await.unwrap();
    let b = spawn_node().await.unwrap();

    a.host()
        .connect(b.identity.peer_id(), &[b.addr()])
        .await
        .unwrap();

    wait_until("a sees b live", || {
        a.transport.is_connected(&b.identity.peer_id())
    })
    .await
    .unwrap();
    wait_until("b sees a live", || {
        b.transport.is_connected(&a.identity.peer_id())
    })
    .await
    .unwrap();

    // Both directories carry the other node as online.
    let a_view = a.directory.snapshot(a.transport.as_ref());
    assert_eq!(a_view.len(), 1);
    assert_eq!(a_view[0].peer_id, b.identity.peer_id());
    assert_eq!(a_view[0].status, ConnectionStatus::Online);

    let b_view = b.directory.snapshot(b.transport.as_ref());
    assert_eq!(b_view.len(), 1);
    assert_eq!(b_view[0].peer_id, a.identity.peer_id());
    assert_eq!(b_view[0].status, ConnectionStatus::Online);

    // The accepting side recorded a dialable address, not the
    // dialer's ephemeral source port.
    assert_eq!(b_view[0].addresses[0].port(), a.transport.listen_port());
}

#[tokio::test]
async fn connect_to_a_live_peer_is_a_no_op() {
    let a = spawn_node().await.unwrap();
    let b = spawn_node().await.unwrap();

    a.host()
        .connect(b.identity.peer_id(), &[b.addr()])
        .await
        .unwrap();
    wait_until("connection up", || {
        a.transport.is_connected(&b.identity.peer_id())
    })
    .await
    .unwrap();

    a.host()
        .connect(b.identity.peer_id(), &[b.addr()])
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(a.transport.connections().len(), 1);
    assert_eq!(b.transport.connections().len(), 1);
}

#[tokio::test]
async fn disconnect_propagates_and_flips_status() {
    let a = spawn_node().await.unwrap();
    let b = spawn_node().await.unwrap();

    a.host()
        .connect(b.identity.peer_id(), &[b.addr()])
        .await
        .unwrap();
    wait_until("b sees a live", || {
        b.transport.is_connected(&a.identity.peer_id())
    })
    .await
    .unwrap();

    b.transport.disconnect(&a.identity.peer_id()).await;

    // EOF reaches a's watch task and clears the live set.
    wait_until("a sees the drop", || {
        !a.transport.is_connected(&b.identity.peer_id())
    })
    .await
    .unwrap();

    let a_view = a.directory.snapshot(a.transport.as_ref());
    assert_eq!(a_view[0].status, ConnectionStatus::Offline);
    // The record itself is retained.
    assert_eq!(a_view[0].peer_id, b.identity.peer_id());
}
