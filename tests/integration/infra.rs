//! Shared fixtures: in-process nodes bound to ephemeral loopback ports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use mirror_core::Identity;
use mirror_services::{PeerDirectory, TcpTransport, TransportHost};

/// One node's worth of daemon state, without discovery or the API.
/// The accept loop stops when `shutdown_tx` fires or the node drops.
pub struct Node {
    pub identity: Arc<Identity>,
    pub directory: Arc<PeerDirectory>,
    pub transport: Arc<TcpTransport>,
    pub shutdown_tx: broadcast::Sender<()>,
    _accept_task: JoinHandle<()>,
}

impl Node {
    pub fn addr(&self) -> SocketAddr {
        format!("127.0.0.1:{}", self.transport.listen_port())
            .parse()
            .unwrap()
    }

    pub fn host(&self) -> Arc<dyn TransportHost> {
        self.transport.clone()
    }
}

pub async fn spawn_node() -> Result<Node> {
    let identity = Arc::new(Identity::generate()?);
    let directory = Arc::new(PeerDirectory::new());
    let (shutdown_tx, _) = broadcast::channel(1);
    let (transport, accept_task) = TcpTransport::bind(
        Arc::clone(&identity),
        Arc::clone(&directory),
        0,
        shutdown_tx.subscribe(),
    )
    .await?;
    Ok(Node {
        identity,
        directory,
        transport,
        shutdown_tx,
        _accept_task: accept_task,
    })
}

/// Poll `cond` until it holds or two seconds pass. Connection teardown
/// propagates through EOF watch tasks, so tests wait rather than assert
/// immediately.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) -> Result<()> {
    for _ in 0..100 {
        if cond() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    bail!("timed out waiting for {what}")
}
