//! Periodic presence advertisement over IPv4 multicast.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use zerocopy::AsBytes;

use mirror_core::wire::PresenceAnnouncement;

/// Build the send socket. Loopback delivery stays on so two nodes on
/// the same host can find each other; TTL 1 keeps datagrams on-link.
pub fn make_announce_socket() -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_multicast_ttl_v4(1)?;
    socket.set_multicast_if_v4(&Ipv4Addr::UNSPECIFIED)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

pub async fn announce_loop(
    announcement: PresenceAnnouncement,
    socket: UdpSocket,
    dest: SocketAddr,
    interval: std::time::Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = socket.send_to(announcement.as_bytes(), dest).await {
                    // Transient on interface flaps; keep announcing.
                    tracing::warn!(error = %err, "presence announce failed");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("announce loop stopping");
                return;
            }
        }
    }
}
