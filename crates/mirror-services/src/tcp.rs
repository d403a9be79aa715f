//! TCP transport — the collaborator that physically carries connections.
//!
//! Each connection starts with a signed hello from both sides. Verifying
//! the hello is the only protocol work the transport does; after that the
//! socket just sits open as a liveness signal. A per-connection watch task
//! removes the peer from the live set the moment the socket closes, so
//! the directory can never report a stale online status.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use zerocopy::{AsBytes, FromBytes};

use mirror_core::identity;
use mirror_core::wire::{hello_payload, HelloFrame, HELLO_MAGIC, WIRE_VERSION};
use mirror_core::{Identity, PeerId};

use crate::directory::PeerDirectory;
use crate::transport::{ConnectError, TransportHost};

const HELLO_LEN: usize = std::mem::size_of::<HelloFrame>();

struct ConnectionInfo {
    peer_addr: SocketAddr,
    established_at: Instant,
    writer: OwnedWriteHalf,
}

pub struct TcpTransport {
    identity: Arc<Identity>,
    directory: Arc<PeerDirectory>,
    local_addr: SocketAddr,
    live: Arc<DashMap<PeerId, ConnectionInfo>>,
}

impl TcpTransport {
    /// Bind the peer listener and start accepting inbound connections.
    ///
    /// Returns the transport and the accept task handle. The accept loop
    /// runs until the shutdown channel fires.
    pub async fn bind(
        identity: Arc<Identity>,
        directory: Arc<PeerDirectory>,
        listen_port: u16,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<(Arc<Self>, JoinHandle<()>)> {
        let listener = TcpListener::bind(("0.0.0.0", listen_port)).await?;
        let local_addr = listener.local_addr()?;

        let transport = Arc::new(Self {
            identity,
            directory,
            local_addr,
            live: Arc::new(DashMap::new()),
        });

        tracing::info!(addr = %local_addr, "peer listener bound");

        let accept_task = {
            let transport = transport.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => {
                            tracing::info!("peer listener shutting down");
                            return;
                        }
                        accepted = listener.accept() => match accepted {
                            Ok((stream, remote)) => {
                                let transport = transport.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = transport.handle_inbound(stream, remote).await {
                                        tracing::debug!(error = %e, %remote, "inbound connection rejected");
                                    }
                                });
                            }
                            Err(e) => tracing::warn!(error = %e, "accept failed"),
                        }
                    }
                }
            })
        };

        Ok((transport, accept_task))
    }

    /// The port the peer listener is bound to.
    pub fn listen_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Live connections with their remote address and age.
    pub fn connections(&self) -> Vec<(PeerId, SocketAddr, Duration)> {
        self.live
            .iter()
            .map(|e| (*e.key(), e.value().peer_addr, e.value().established_at.elapsed()))
            .collect()
    }

    /// Close the connection to a peer, if one exists.
    pub async fn disconnect(&self, peer_id: &PeerId) {
        if let Some((_, mut info)) = self.live.remove(peer_id) {
            let _ = info.writer.shutdown().await;
            tracing::info!(peer = %peer_id, "connection closed");
        }
    }

    async fn handle_inbound(&self, mut stream: TcpStream, remote: SocketAddr) -> anyhow::Result<()> {
        let (peer_id, their_port) = self.exchange_hello(&mut stream).await?;

        if peer_id == self.identity.peer_id() {
            anyhow::bail!("connection from our own identity");
        }

        // The dialing side's source port is ephemeral; record the listen
        // port it told us in the hello as its dialable address.
        let peer_addr = SocketAddr::new(remote.ip(), their_port);
        if self.register(stream, peer_id, peer_addr) {
            tracing::info!(peer = %peer_id, addr = %peer_addr, "inbound peer connected");
        } else {
            tracing::debug!(peer = %peer_id, "already connected, dropping duplicate");
        }
        Ok(())
    }

    async fn dial(&self, expected: PeerId, addr: SocketAddr) -> Result<(), ConnectError> {
        let mut stream = TcpStream::connect(addr).await?;
        let (peer_id, their_port) = self.exchange_hello(&mut stream).await?;

        if peer_id != expected {
            return Err(ConnectError::PeerMismatch {
                expected,
                actual: peer_id,
            });
        }

        let peer_addr = SocketAddr::new(addr.ip(), their_port);
        if self.register(stream, peer_id, peer_addr) {
            tracing::info!(peer = %peer_id, addr = %peer_addr, "outbound peer connected");
        }
        Ok(())
    }

    /// Send our signed hello and verify the peer's.
    async fn exchange_hello(&self, stream: &mut TcpStream) -> Result<(PeerId, u16), ConnectError> {
        let listen_port = self.local_addr.port();
        let public_key = self.identity.public_key();
        let signature = self.identity.sign(&hello_payload(&public_key, listen_port));
        let ours = HelloFrame {
            magic: HELLO_MAGIC,
            version: WIRE_VERSION,
            reserved: 0,
            listen_port,
            public_key,
            signature,
        };
        stream.write_all(ours.as_bytes()).await?;

        let mut buf = [0u8; HELLO_LEN];
        stream.read_exact(&mut buf).await?;
        let theirs = HelloFrame::read_from(&buf[..])
            .ok_or_else(|| ConnectError::Handshake("malformed hello frame".into()))?;

        // Copy out of the packed struct before taking references
        let their_key = theirs.public_key;
        let their_port = theirs.listen_port;
        let their_sig = theirs.signature;

        if theirs.magic != HELLO_MAGIC || theirs.version != WIRE_VERSION {
            return Err(ConnectError::Handshake("bad magic or version".into()));
        }
        if !identity::verify(&their_key, &hello_payload(&their_key, their_port), &their_sig) {
            return Err(ConnectError::Handshake("signature verification failed".into()));
        }

        Ok((PeerId::from_public_key(&their_key), their_port))
    }

    /// Add a verified connection to the live set and start its watch task.
    /// Returns false (and closes the stream) if the peer is already connected.
    fn register(&self, stream: TcpStream, peer_id: PeerId, peer_addr: SocketAddr) -> bool {
        let (reader, writer) = stream.into_split();
        match self.live.entry(peer_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(ConnectionInfo {
                    peer_addr,
                    established_at: Instant::now(),
                    writer,
                });
                self.directory
                    .upsert_sighting(peer_id, &[peer_addr], SystemTime::now());

                let live = self.live.clone();
                tokio::spawn(watch_connection(live, peer_id, reader));
                true
            }
        }
    }
}

/// Hold the read half open until the peer closes or errors, then clear
/// the live entry so status queries see the disconnect immediately.
async fn watch_connection(
    live: Arc<DashMap<PeerId, ConnectionInfo>>,
    peer_id: PeerId,
    mut reader: OwnedReadHalf,
) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf).await {
            // Nothing is spoken after the hello; any bytes are ignored
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
    if live.remove(&peer_id).is_some() {
        tracing::info!(peer = %peer_id, "peer disconnected");
    }
}

#[async_trait]
impl TransportHost for TcpTransport {
    fn local_peer_id(&self) -> PeerId {
        self.identity.peer_id()
    }

    fn listen_addresses(&self) -> Vec<SocketAddr> {
        vec![self.local_addr]
    }

    async fn connect(&self, peer_id: PeerId, addresses: &[SocketAddr]) -> Result<(), ConnectError> {
        if self.is_connected(&peer_id) {
            return Ok(());
        }
        if addresses.is_empty() {
            return Err(ConnectError::NoAddresses);
        }

        let mut last_err = None;
        for addr in addresses {
            match self.dial(peer_id, *addr).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(peer = %peer_id, %addr, error = %e, "dial failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.expect("at least one address was tried"))
    }

    fn live_connections(&self) -> HashSet<PeerId> {
        self.live.iter().map(|e| *e.key()).collect()
    }

    fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.live.contains_key(peer_id)
    }
}
